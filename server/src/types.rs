use chatrelay_core::ids::UserId;
use chatrelay_core::membership::NewMember;
use serde::{Deserialize, Serialize};

/// The success half of the `{ok, data | errorMessage}` response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct ApiData<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> ApiData<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub members: Vec<NewMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMembersRequest {
    pub new_members: Vec<NewMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGroupRequest {
    #[serde(default)]
    pub new_owner_id: Option<UserId>,
}
