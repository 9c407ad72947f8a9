use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::ids::UserId;

/// Online/offline state plus last-seen timestamp for one user, independent of
/// any single connection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceState {
    pub online: bool,
    pub last_online_time: Option<DateTime<Utc>>,
}

/// Tracks presence per user. A user with N live connections is online as long
/// as at least one exists; the relay calls [`PresenceTracker::mark_offline`]
/// only when the disconnecting connection was the user's last one.
#[derive(Default)]
pub struct PresenceTracker {
    users: DashMap<UserId, PresenceState>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_online(&self, user_id: &UserId) {
        self.users
            .entry(user_id.clone())
            .and_modify(|state| state.online = true)
            .or_insert(PresenceState {
                online: true,
                last_online_time: None,
            });
    }

    /// Flips the user offline and stamps the last-seen time. Safe to call
    /// concurrently; the timestamp is last-writer-wins.
    pub fn mark_offline(&self, user_id: &UserId) {
        let now = Utc::now();
        self.users
            .entry(user_id.clone())
            .and_modify(|state| {
                state.online = false;
                state.last_online_time = Some(now);
            })
            .or_insert(PresenceState {
                online: false,
                last_online_time: Some(now),
            });
    }

    pub fn snapshot(&self, user_id: &UserId) -> Option<PresenceState> {
        self.users.get(user_id).map(|state| state.clone())
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.users
            .get(user_id)
            .map(|state| state.online)
            .unwrap_or(false)
    }
}
