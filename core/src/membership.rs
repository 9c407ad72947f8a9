use std::collections::HashMap;
use std::fmt;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{
    group::{ChatRoomRecord, GroupRecord, MemberRecord, Role},
    ids::{ChatRoomId, GroupId, UserId},
    permission,
};

/// Errors surfaced by membership operations. Translated to the HTTP envelope
/// at the server boundary; never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipError {
    /// Malformed or insufficient input; user-fixable.
    Validation(String),
    /// Referenced group or member is absent.
    NotFound(String),
    /// Requester lacks the required role.
    Permission(String),
    /// A group with the same member set already exists.
    Conflict(String),
}

impl MembershipError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message)
            | Self::NotFound(message)
            | Self::Permission(message)
            | Self::Conflict(message) => message,
        }
    }
}

impl fmt::Display for MembershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for MembershipError {}

/// A member named by a membership mutation request. Roles default to
/// [`Role::Member`] when the caller does not specify any.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
}

impl NewMember {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: None,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    groups: HashMap<GroupId, GroupRecord>,
    chat_rooms: HashMap<ChatRoomId, ChatRoomRecord>,
}

/// Owns group and chat-room records. Every mutation takes the write lock, so
/// operations on one group are serialized and the duplicate-member-set scan
/// in [`MembershipStore::create_group`] is atomic with the insert.
pub struct MembershipStore {
    inner: RwLock<StoreInner>,
}

impl Default for MembershipStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub async fn find_by_id(&self, group_id: &GroupId) -> Option<GroupRecord> {
        self.inner.read().await.groups.get(group_id).cloned()
    }

    pub async fn groups_for_user(&self, user_id: &UserId) -> Vec<GroupRecord> {
        self.inner
            .read()
            .await
            .groups
            .values()
            .filter(|group| group.is_member(user_id))
            .cloned()
            .collect()
    }

    pub async fn chat_room(&self, chat_room_id: &ChatRoomId) -> Option<ChatRoomRecord> {
        self.inner
            .read()
            .await
            .chat_rooms
            .get(chat_room_id)
            .cloned()
    }

    /// Update the denormalized room summary. Unknown rooms are ignored; the
    /// relay treats a message for a vanished room as undeliverable, not fatal.
    pub async fn set_last_message(&self, chat_room_id: &ChatRoomId, summary: &str) {
        let mut inner = self.inner.write().await;
        if let Some(room) = inner.chat_rooms.get_mut(chat_room_id) {
            room.last_message = Some(summary.to_owned());
        }
    }

    pub async fn create_group(
        &self,
        owner_id: &UserId,
        name: &str,
        initial_members: &[NewMember],
    ) -> Result<GroupRecord, MembershipError> {
        let trimmed_name = name.trim();
        if trimmed_name.is_empty() {
            return Err(MembershipError::validation("group name must not be empty"));
        }
        if initial_members.len() < 2 {
            return Err(MembershipError::validation(
                "a group requires at least two initial members",
            ));
        }

        let now = Utc::now();
        let mut members: Vec<MemberRecord> = vec![MemberRecord {
            user_id: owner_id.clone(),
            add_by_user_id: owner_id.clone(),
            roles: vec![Role::Owner],
            add_at: now,
        }];
        for candidate in initial_members {
            if members
                .iter()
                .any(|member| member.user_id == candidate.user_id)
            {
                continue;
            }
            members.push(MemberRecord {
                user_id: candidate.user_id.clone(),
                add_by_user_id: owner_id.clone(),
                roles: vec![Role::Admin],
                add_at: now,
            });
        }

        let mut inner = self.inner.write().await;

        let member_ids: std::collections::BTreeSet<UserId> = members
            .iter()
            .map(|member| member.user_id.clone())
            .collect();
        let duplicate = inner
            .groups
            .values()
            .any(|existing| existing.member_id_set() == member_ids);
        if duplicate {
            return Err(MembershipError::conflict(
                "a group with the same members already exists",
            ));
        }

        let chat_room = ChatRoomRecord {
            id: ChatRoomId::from(Uuid::new_v4().to_string()),
            last_message: None,
        };
        let group = GroupRecord {
            id: GroupId::from(Uuid::new_v4().to_string()),
            name: trimmed_name.to_owned(),
            owner_id: owner_id.clone(),
            chat_room_id: chat_room.id.clone(),
            members,
        };

        debug!(group_id = %group.id, owner_id = %owner_id, "created group");
        inner.chat_rooms.insert(chat_room.id.clone(), chat_room);
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }

    pub async fn add_members(
        &self,
        group_id: &GroupId,
        requester_id: &UserId,
        new_members: &[NewMember],
    ) -> Result<GroupRecord, MembershipError> {
        if new_members.is_empty() {
            return Err(MembershipError::validation(
                "at least one new member is required",
            ));
        }

        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .get_mut(group_id)
            .ok_or_else(|| MembershipError::not_found("group not found"))?;

        let perms = permission::evaluate(requester_id, group);
        if !perms.can_edit_member() {
            return Err(MembershipError::permission(
                "you are not allowed to add members to this group",
            ));
        }

        // OWNER is only ever granted through leave_group's handover; checked
        // before the loop so a rejected request leaves the group untouched.
        let grants_owner = new_members.iter().any(|candidate| {
            candidate
                .roles
                .as_ref()
                .is_some_and(|roles| roles.contains(&Role::Owner))
        });
        if grants_owner {
            return Err(MembershipError::validation(
                "new members cannot be granted the owner role",
            ));
        }

        let now = Utc::now();
        let mut appended = 0usize;
        for candidate in new_members {
            let already_present = group
                .members
                .iter()
                .any(|member| member.user_id == candidate.user_id);
            if already_present {
                continue;
            }

            let roles = match &candidate.roles {
                Some(roles) if !roles.is_empty() => roles.clone(),
                _ => vec![Role::Member],
            };
            group.members.push(MemberRecord {
                user_id: candidate.user_id.clone(),
                add_by_user_id: requester_id.clone(),
                roles,
                add_at: now,
            });
            appended += 1;
        }

        if appended == 0 {
            return Err(MembershipError::validation(
                "every listed member already belongs to the group",
            ));
        }

        Ok(group.clone())
    }

    pub async fn remove_member(
        &self,
        group_id: &GroupId,
        requester_id: &UserId,
        target_user_id: &UserId,
    ) -> Result<GroupRecord, MembershipError> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .get_mut(group_id)
            .ok_or_else(|| MembershipError::not_found("group not found"))?;

        let perms = permission::evaluate(requester_id, group);
        if !perms.can_edit_member() {
            return Err(MembershipError::permission(
                "you are not allowed to remove members from this group",
            ));
        }
        if target_user_id == requester_id {
            return Err(MembershipError::permission(
                "you cannot remove yourself; leave the group instead",
            ));
        }
        if &group.owner_id == target_user_id {
            return Err(MembershipError::permission(
                "the group owner cannot be removed",
            ));
        }

        let position = group
            .members
            .iter()
            .position(|member| &member.user_id == target_user_id)
            .ok_or_else(|| MembershipError::not_found("member not found in group"))?;
        group.members.remove(position);

        Ok(group.clone())
    }

    /// Leaving as the owner hands the `{OWNER}` role set to `new_owner_id`
    /// before the requester is dropped. A non-owner leave that would strand a
    /// single remaining member is rejected before any mutation.
    pub async fn leave_group(
        &self,
        group_id: &GroupId,
        requester_id: &UserId,
        new_owner_id: Option<&UserId>,
    ) -> Result<GroupRecord, MembershipError> {
        let mut inner = self.inner.write().await;
        let group = inner
            .groups
            .get_mut(group_id)
            .ok_or_else(|| MembershipError::not_found("group not found"))?;

        let perms = permission::evaluate(requester_id, group);
        if perms.is_owner() {
            let new_owner_id = new_owner_id.ok_or_else(|| {
                MembershipError::validation("a new owner must be chosen before leaving")
            })?;
            if new_owner_id == requester_id {
                return Err(MembershipError::validation(
                    "the departing owner cannot be the new owner",
                ));
            }

            let new_owner = group
                .members
                .iter_mut()
                .find(|member| &member.user_id == new_owner_id)
                .ok_or_else(|| {
                    MembershipError::validation("the chosen owner is not a member of the group")
                })?;
            new_owner.roles = vec![Role::Owner];

            group
                .members
                .retain(|member| &member.user_id != requester_id);
            group.owner_id = new_owner_id.clone();

            return Ok(group.clone());
        }

        if !group.is_member(requester_id) {
            return Err(MembershipError::validation(
                "you are not a member of this group",
            ));
        }
        if group.members.len() <= 2 {
            return Err(MembershipError::validation(
                "the last members cannot leave the group",
            ));
        }

        group
            .members
            .retain(|member| &member.user_id != requester_id);

        Ok(group.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    fn invitees(ids: &[&str]) -> Vec<NewMember> {
        ids.iter().map(|id| NewMember::new(*id)).collect()
    }

    fn assert_single_owner(group: &GroupRecord) {
        let owners: Vec<_> = group
            .members
            .iter()
            .filter(|member| member.has_role(Role::Owner))
            .collect();
        assert_eq!(owners.len(), 1, "exactly one member must hold OWNER");
        assert_eq!(owners[0].user_id, group.owner_id);
    }

    async fn seed(store: &MembershipStore) -> GroupRecord {
        store
            .create_group(&user("alice"), "trio", &invitees(&["bob", "carol"]))
            .await
            .expect("create group")
    }

    #[tokio::test]
    async fn create_group_assigns_roles_and_chat_room() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        assert_eq!(group.owner_id, user("alice"));
        assert_single_owner(&group);
        assert_eq!(group.members.len(), 3);
        assert!(group
            .member(&user("bob"))
            .is_some_and(|member| member.has_role(Role::Admin)));
        assert!(store.chat_room(&group.chat_room_id).await.is_some());
    }

    #[tokio::test]
    async fn create_group_rejects_bad_input() {
        let store = MembershipStore::new();

        let err = store
            .create_group(&user("alice"), "  ", &invitees(&["bob", "carol"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));

        let err = store
            .create_group(&user("alice"), "duo", &invitees(&["bob"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));
    }

    #[tokio::test]
    async fn create_group_dedupes_owner_listed_as_member() {
        let store = MembershipStore::new();
        let group = store
            .create_group(&user("alice"), "trio", &invitees(&["alice", "bob", "carol"]))
            .await
            .expect("create group");

        assert_eq!(group.members.len(), 3);
        assert_single_owner(&group);
    }

    #[tokio::test]
    async fn create_group_detects_duplicate_member_set_regardless_of_order() {
        let store = MembershipStore::new();
        seed(&store).await;

        let err = store
            .create_group(&user("alice"), "trio again", &invitees(&["carol", "bob"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Conflict(_)));
    }

    #[tokio::test]
    async fn add_members_drops_existing_and_never_duplicates() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let updated = store
            .add_members(
                &group.id,
                &user("alice"),
                &invitees(&["bob", "dave", "dave"]),
            )
            .await
            .expect("add members");

        assert_eq!(updated.members.len(), 4);
        let ids: Vec<_> = updated
            .members
            .iter()
            .map(|member| member.user_id.as_str())
            .collect();
        assert_eq!(
            ids.iter()
                .filter(|id| **id == "dave")
                .count(),
            1
        );
        assert!(updated
            .member(&user("dave"))
            .is_some_and(|member| member.has_role(Role::Member)));
    }

    #[tokio::test]
    async fn add_members_rejects_owner_in_requested_roles() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .add_members(
                &group.id,
                &user("alice"),
                &[NewMember {
                    user_id: user("dave"),
                    roles: Some(vec![Role::Owner]),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));

        // a tainted batch appends nothing, not even its valid entries
        let err = store
            .add_members(
                &group.id,
                &user("alice"),
                &[
                    NewMember::new("erin"),
                    NewMember {
                        user_id: user("dave"),
                        roles: Some(vec![Role::Owner, Role::Admin]),
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));

        let after = store.find_by_id(&group.id).await.expect("group exists");
        assert!(!after.is_member(&user("dave")));
        assert!(!after.is_member(&user("erin")));
        assert_single_owner(&after);
    }

    #[tokio::test]
    async fn add_members_fails_when_nothing_remains() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .add_members(&group.id, &user("alice"), &invitees(&["bob", "carol"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));
    }

    #[tokio::test]
    async fn add_members_requires_edit_capability() {
        let store = MembershipStore::new();
        let group = seed(&store).await;
        store
            .add_members(&group.id, &user("alice"), &invitees(&["dave"]))
            .await
            .expect("seed plain member");

        let err = store
            .add_members(&group.id, &user("dave"), &invitees(&["erin"]))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Permission(_)));
    }

    #[tokio::test]
    async fn remove_member_rejects_self_removal() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .remove_member(&group.id, &user("alice"), &user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Permission(_)));
    }

    #[tokio::test]
    async fn remove_member_protects_the_owner() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .remove_member(&group.id, &user("bob"), &user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Permission(_)));
    }

    #[tokio::test]
    async fn remove_member_removes_target() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let updated = store
            .remove_member(&group.id, &user("alice"), &user("carol"))
            .await
            .expect("remove member");

        assert!(!updated.is_member(&user("carol")));
        assert_single_owner(&updated);
    }

    #[tokio::test]
    async fn remove_member_missing_target_is_not_found() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .remove_member(&group.id, &user("alice"), &user("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::NotFound(_)));
    }

    #[tokio::test]
    async fn owner_leave_requires_successor() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .leave_group(&group.id, &user("alice"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));

        let err = store
            .leave_group(&group.id, &user("alice"), Some(&user("ghost")))
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));
    }

    #[tokio::test]
    async fn owner_leave_transfers_ownership() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let updated = store
            .leave_group(&group.id, &user("alice"), Some(&user("bob")))
            .await
            .expect("owner leaves");

        assert_eq!(updated.owner_id, user("bob"));
        assert!(!updated.is_member(&user("alice")));
        let bob = updated.member(&user("bob")).expect("bob present");
        assert_eq!(bob.roles, vec![Role::Owner]);
        assert_single_owner(&updated);
    }

    #[tokio::test]
    async fn non_owner_leave_removes_requester() {
        let store = MembershipStore::new();
        let group = seed(&store).await;
        store
            .add_members(&group.id, &user("alice"), &invitees(&["dave"]))
            .await
            .expect("add member");

        let updated = store
            .leave_group(&group.id, &user("carol"), None)
            .await
            .expect("member leaves");

        assert!(!updated.is_member(&user("carol")));
        assert_single_owner(&updated);
    }

    #[tokio::test]
    async fn leave_is_rejected_before_mutation_at_the_singleton_boundary() {
        let store = MembershipStore::new();
        let group = seed(&store).await;
        store
            .remove_member(&group.id, &user("alice"), &user("carol"))
            .await
            .expect("shrink to two members");

        let err = store
            .leave_group(&group.id, &user("bob"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));

        let after = store.find_by_id(&group.id).await.expect("group exists");
        assert!(after.is_member(&user("bob")), "no partial removal");
        assert_eq!(after.members.len(), 2);
    }

    #[tokio::test]
    async fn non_member_leave_is_validation_error() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        let err = store
            .leave_group(&group.id, &user("ghost"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MembershipError::Validation(_)));
    }

    #[tokio::test]
    async fn end_to_end_ownership_transfer_scenario() {
        let store = MembershipStore::new();
        let group = store
            .create_group(&user("a"), "abc", &invitees(&["b", "c"]))
            .await
            .expect("create");
        store
            .add_members(&group.id, &user("a"), &invitees(&["d"]))
            .await
            .expect("widen group past the leave boundary");
        store
            .remove_member(&group.id, &user("a"), &user("d"))
            .await
            .expect("narrow again");

        let updated = store
            .leave_group(&group.id, &user("a"), Some(&user("b")))
            .await
            .expect("transfer and leave");

        assert_eq!(updated.owner_id, user("b"));
        assert!(!updated.is_member(&user("a")));
        assert_eq!(
            updated.member(&user("b")).unwrap().roles,
            vec![Role::Owner]
        );
        assert!(updated.is_member(&user("c")));
        assert_single_owner(&updated);
    }

    #[tokio::test]
    async fn set_last_message_updates_room_summary() {
        let store = MembershipStore::new();
        let group = seed(&store).await;

        store.set_last_message(&group.chat_room_id, "hello").await;
        let room = store.chat_room(&group.chat_room_id).await.unwrap();
        assert_eq!(room.last_message.as_deref(), Some("hello"));

        store
            .set_last_message(&ChatRoomId::from("missing"), "dropped")
            .await;
    }
}
