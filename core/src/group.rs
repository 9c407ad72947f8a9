use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChatRoomId, GroupId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (user, roles, audit metadata) record inside a group. Not a standalone
/// entity; uniqueness by `user_id` is enforced by the membership store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub user_id: UserId,
    pub add_by_user_id: UserId,
    /// Non-empty. Capabilities are computed from the set, not inherited.
    pub roles: Vec<Role>,
    pub add_at: DateTime<Utc>,
}

impl MemberRecord {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    /// Always equals the user id of the single member holding [`Role::Owner`].
    pub owner_id: UserId,
    pub chat_room_id: ChatRoomId,
    pub members: Vec<MemberRecord>,
}

impl GroupRecord {
    pub fn member(&self, user_id: &UserId) -> Option<&MemberRecord> {
        self.members.iter().find(|member| &member.user_id == user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.member(user_id).is_some()
    }

    /// The member-set identity used for duplicate-group detection: user ids
    /// only, order-independent, roles and audit metadata ignored.
    pub fn member_id_set(&self) -> BTreeSet<UserId> {
        self.members
            .iter()
            .map(|member| member.user_id.clone())
            .collect()
    }
}

/// Denormalized chat room summary, kept 1:1 with its group for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoomRecord {
    pub id: ChatRoomId,
    pub last_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(user_id: &str, roles: Vec<Role>) -> MemberRecord {
        MemberRecord {
            user_id: UserId::from(user_id),
            add_by_user_id: UserId::from("adder"),
            roles,
            add_at: Utc::now(),
        }
    }

    #[test]
    fn member_id_set_ignores_order_and_roles() {
        let a = GroupRecord {
            id: GroupId::from("g1"),
            name: "one".into(),
            owner_id: UserId::from("u1"),
            chat_room_id: ChatRoomId::from("c1"),
            members: vec![
                member("u1", vec![Role::Owner]),
                member("u2", vec![Role::Admin]),
            ],
        };
        let b = GroupRecord {
            id: GroupId::from("g2"),
            name: "two".into(),
            owner_id: UserId::from("u2"),
            chat_room_id: ChatRoomId::from("c2"),
            members: vec![
                member("u2", vec![Role::Owner]),
                member("u1", vec![Role::Member]),
            ],
        };

        assert_eq!(a.member_id_set(), b.member_id_set());
    }

    #[test]
    fn role_wire_names_are_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
        assert_eq!(
            serde_json::from_str::<Role>("\"member\"").unwrap(),
            Role::Member
        );
    }
}
