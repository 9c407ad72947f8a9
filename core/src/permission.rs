use crate::{
    group::{GroupRecord, Role},
    ids::UserId,
};

/// Capability set of one user within one group, computed once per evaluation.
/// A plain value so callers can pass it around instead of re-deriving roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    owner: bool,
    admin: bool,
}

impl Permissions {
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    /// Owner does not imply admin; the role set must contain both explicitly.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn can_edit_member(&self) -> bool {
        self.owner || self.admin
    }

    pub fn can_edit_group(&self) -> bool {
        self.owner || self.admin
    }
}

/// Evaluate `user_id`'s capabilities in `group`. A non-member gets the empty
/// capability set; this never fails.
pub fn evaluate(user_id: &UserId, group: &GroupRecord) -> Permissions {
    match group.member(user_id) {
        Some(member) => Permissions {
            owner: member.has_role(Role::Owner),
            admin: member.has_role(Role::Admin),
        },
        None => Permissions::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MemberRecord;
    use crate::ids::{ChatRoomId, GroupId};
    use chrono::Utc;

    fn group_with(members: Vec<(&str, Vec<Role>)>) -> GroupRecord {
        let members = members
            .into_iter()
            .map(|(user_id, roles)| MemberRecord {
                user_id: UserId::from(user_id),
                add_by_user_id: UserId::from("owner"),
                roles,
                add_at: Utc::now(),
            })
            .collect();

        GroupRecord {
            id: GroupId::from("group"),
            name: "group".into(),
            owner_id: UserId::from("owner"),
            chat_room_id: ChatRoomId::from("room"),
            members,
        }
    }

    #[test]
    fn owner_can_edit_but_is_not_admin() {
        let group = group_with(vec![("owner", vec![Role::Owner])]);
        let perms = evaluate(&UserId::from("owner"), &group);

        assert!(perms.is_owner());
        assert!(!perms.is_admin());
        assert!(perms.can_edit_member());
        assert!(perms.can_edit_group());
    }

    #[test]
    fn admin_can_edit_without_ownership() {
        let group = group_with(vec![("admin", vec![Role::Admin])]);
        let perms = evaluate(&UserId::from("admin"), &group);

        assert!(!perms.is_owner());
        assert!(perms.is_admin());
        assert!(perms.can_edit_member());
    }

    #[test]
    fn plain_member_cannot_edit() {
        let group = group_with(vec![("member", vec![Role::Member])]);
        let perms = evaluate(&UserId::from("member"), &group);

        assert!(!perms.is_owner());
        assert!(!perms.is_admin());
        assert!(!perms.can_edit_member());
        assert!(!perms.can_edit_group());
    }

    #[test]
    fn non_member_gets_empty_capability_set() {
        let group = group_with(vec![("owner", vec![Role::Owner])]);
        let perms = evaluate(&UserId::from("stranger"), &group);

        assert_eq!(perms, Permissions::default());
        assert!(!perms.can_edit_member());
    }

    #[test]
    fn explicit_owner_and_admin_roles_both_apply() {
        let group = group_with(vec![("both", vec![Role::Owner, Role::Admin])]);
        let perms = evaluate(&UserId::from("both"), &group);

        assert!(perms.is_owner());
        assert!(perms.is_admin());
    }
}
