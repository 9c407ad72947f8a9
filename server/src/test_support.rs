#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use chatrelay_core::AppConfig;

use crate::{
    meeting::MeetingClient,
    state::{AppState, build_state_with_meeting},
};

/// Meeting stub returning a fixed id, so handler tests never touch the
/// network.
pub(crate) struct StaticMeetingClient(pub &'static str);

#[async_trait]
impl MeetingClient for StaticMeetingClient {
    async fn create_meeting(&self) -> Result<String> {
        Ok(self.0.to_owned())
    }
}

pub(crate) fn setup_state() -> AppState {
    build_state_with_meeting(
        AppConfig::default(),
        Arc::new(StaticMeetingClient("meeting-test")),
    )
}
