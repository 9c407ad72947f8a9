use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;

/// External meeting-creation collaborator. `call` events suspend on this; the
/// relay never holds a lock across the await and treats failure as a dropped
/// event, not a crash.
#[async_trait]
pub trait MeetingClient: Send + Sync {
    async fn create_meeting(&self) -> Result<String>;
}

pub struct HttpMeetingClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMeetingClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMeetingResponse {
    meeting_id: String,
}

#[async_trait]
impl MeetingClient for HttpMeetingClient {
    async fn create_meeting(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .send()
            .await
            .context("meeting endpoint unreachable")?
            .error_for_status()
            .context("meeting endpoint returned an error status")?;

        let body: CreateMeetingResponse = response
            .json()
            .await
            .context("meeting endpoint returned an invalid body")?;

        Ok(body.meeting_id)
    }
}

/// Used when no meeting endpoint is configured; every `call` event fails
/// deliberately and is dropped by the dispatcher.
pub struct DisabledMeetingClient;

#[async_trait]
impl MeetingClient for DisabledMeetingClient {
    async fn create_meeting(&self) -> Result<String> {
        Err(anyhow!("no meeting endpoint configured"))
    }
}
