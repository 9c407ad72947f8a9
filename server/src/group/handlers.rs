// Group membership handlers

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::info;

use chatrelay_core::ids::GroupId;

use crate::{
    auth::require_user_id,
    error::AppError,
    state::AppState,
    types::{AddMembersRequest, ApiData, CreateGroupRequest, LeaveGroupRequest, RemoveMemberRequest},
};

pub(crate) async fn create_group_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let requester = require_user_id(&headers)?;

    let group = state
        .membership
        .create_group(&requester, &payload.name, &payload.members)
        .await?;

    info!(group_id = %group.id, owner_id = %requester, "group created");

    Ok((StatusCode::CREATED, Json(ApiData::new(group))))
}

pub(crate) async fn list_groups_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let requester = require_user_id(&headers)?;

    let groups = state.membership.groups_for_user(&requester).await;

    Ok(Json(ApiData::new(groups)))
}

pub(crate) async fn get_group_handler(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    headers: HeaderMap,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let requester = require_user_id(&headers)?;

    let group = state
        .membership
        .find_by_id(&group_id)
        .await
        .ok_or_else(|| AppError::not_found("group not found"))?;
    if !group.is_member(&requester) {
        return Err(AppError::forbidden("you are not a member of this group"));
    }

    Ok(Json(ApiData::new(group)))
}

pub(crate) async fn add_members_handler(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    headers: HeaderMap,
    Json(payload): Json<AddMembersRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let requester = require_user_id(&headers)?;

    let group = state
        .membership
        .add_members(&group_id, &requester, &payload.new_members)
        .await?;

    info!(group_id = %group.id, requester_id = %requester, "members added");

    Ok(Json(ApiData::new(group)))
}

pub(crate) async fn remove_member_handler(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    headers: HeaderMap,
    Json(payload): Json<RemoveMemberRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let requester = require_user_id(&headers)?;

    let group = state
        .membership
        .remove_member(&group_id, &requester, &payload.user_id)
        .await?;

    info!(
        group_id = %group.id,
        requester_id = %requester,
        removed_user_id = %payload.user_id,
        "member removed"
    );

    Ok(Json(ApiData::new(group)))
}

pub(crate) async fn leave_group_handler(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    headers: HeaderMap,
    Json(payload): Json<LeaveGroupRequest>,
) -> Result<impl IntoResponse + std::fmt::Debug, AppError> {
    let requester = require_user_id(&headers)?;

    let group = state
        .membership
        .leave_group(&group_id, &requester, payload.new_owner_id.as_ref())
        .await?;

    info!(group_id = %group.id, requester_id = %requester, "member left");

    Ok(Json(ApiData::new(group)))
}
