use std::collections::HashSet;

use chatrelay_core::ids::UserId;
use dashmap::DashMap;

use super::rooms;

#[derive(Debug, Default, Clone)]
struct ConnectionInfo {
    user_id: Option<UserId>,
    rooms: HashSet<String>,
}

/// Outcome of unbinding a connection; `last_connection` tells the relay
/// whether the user just lost their final live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unbound {
    pub user_id: UserId,
    pub last_connection: bool,
}

/// Live mapping of connections to users and rooms. All operations are
/// idempotent; repeated binds/joins are no-ops and a double disconnect is
/// harmless. Sharded per-key locking via `DashMap` is enough because every
/// operation is O(1)-ish over a single connection's keys.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionInfo>,
    user_connections: DashMap<UserId, HashSet<String>>,
    room_connections: DashMap<String, HashSet<String>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a connection to a user and implicitly joins the user's private
    /// notification channel, so targeted notifications reach every one of the
    /// user's connections without an explicit join event.
    pub fn bind(&self, connection_id: &str, user_id: &UserId) {
        let previous = {
            let mut info = self.connections.entry(connection_id.to_owned()).or_default();
            if info.user_id.as_ref() == Some(user_id) {
                return;
            }
            info.user_id.replace(user_id.clone())
        };

        if let Some(previous) = previous {
            if let Some(mut connections) = self.user_connections.get_mut(&previous) {
                connections.remove(connection_id);
            }
            self.user_connections
                .remove_if(&previous, |_, connections| connections.is_empty());
        }

        self.user_connections
            .entry(user_id.clone())
            .or_default()
            .insert(connection_id.to_owned());

        self.join_room(connection_id, &rooms::private_channel(user_id));
    }

    /// Joining is a no-op for a connection that was never bound or already
    /// left; a join racing a disconnect must not resurrect the entry.
    pub fn join_room(&self, connection_id: &str, room: &str) {
        let Some(mut info) = self.connections.get_mut(connection_id) else {
            return;
        };
        if !info.rooms.insert(room.to_owned()) {
            return;
        }
        drop(info);

        self.room_connections
            .entry(room.to_owned())
            .or_default()
            .insert(connection_id.to_owned());
    }

    /// Removes the connection from every room and from its user's connection
    /// set. Returns the bound user when there was one; `None` on a repeat
    /// call or for a connection that never bound.
    pub fn leave_all(&self, connection_id: &str) -> Option<Unbound> {
        let (_, info) = self.connections.remove(connection_id)?;

        for room in &info.rooms {
            if let Some(mut members) = self.room_connections.get_mut(room) {
                members.remove(connection_id);
                if members.is_empty() {
                    drop(members);
                    self.room_connections
                        .remove_if(room, |_, members| members.is_empty());
                }
            }
        }

        let user_id = info.user_id?;
        let mut last_connection = true;
        if let Some(mut connections) = self.user_connections.get_mut(&user_id) {
            connections.remove(connection_id);
            last_connection = connections.is_empty();
        }
        if last_connection {
            self.user_connections
                .remove_if(&user_id, |_, connections| connections.is_empty());
        }

        Some(Unbound {
            user_id,
            last_connection,
        })
    }

    pub fn bound_user(&self, connection_id: &str) -> Option<UserId> {
        self.connections
            .get(connection_id)
            .and_then(|info| info.user_id.clone())
    }

    pub fn connections_in_room(&self, room: &str) -> HashSet<String> {
        self.room_connections
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    pub fn connections_for_user(&self, user_id: &UserId) -> HashSet<String> {
        self.user_connections
            .get(user_id)
            .map(|connections| connections.clone())
            .unwrap_or_default()
    }
}
