use std::sync::Arc;

use chatrelay_core::{AppConfig, MembershipStore, PresenceTracker};

use crate::{
    meeting::{DisabledMeetingClient, HttpMeetingClient, MeetingClient},
    socket::registry::ConnectionRegistry,
};

/// The relay server's shared state: connection registry, presence tracker and
/// membership store, constructed once at startup and passed to every HTTP and
/// socket handler. No hidden globals.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub membership: Arc<MembershipStore>,
    pub presence: Arc<PresenceTracker>,
    pub registry: Arc<ConnectionRegistry>,
    pub meeting: Arc<dyn MeetingClient>,
}

pub fn build_state(config: AppConfig) -> AppState {
    let meeting: Arc<dyn MeetingClient> = match config.meeting_api_url.as_deref() {
        Some(endpoint) => Arc::new(HttpMeetingClient::new(endpoint)),
        None => Arc::new(DisabledMeetingClient),
    };

    build_state_with_meeting(config, meeting)
}

pub fn build_state_with_meeting(config: AppConfig, meeting: Arc<dyn MeetingClient>) -> AppState {
    AppState {
        config: Arc::new(config),
        membership: Arc::new(MembershipStore::new()),
        presence: Arc::new(PresenceTracker::new()),
        registry: Arc::new(ConnectionRegistry::new()),
        meeting,
    }
}
