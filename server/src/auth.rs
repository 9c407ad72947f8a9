use axum::http::HeaderMap;
use chatrelay_core::ids::UserId;

use crate::error::AppError;

/// Header carrying the verified requester id. Upstream authentication is an
/// external collaborator; this server trusts the id it hands over.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn require_user_id(headers: &HeaderMap) -> Result<UserId, AppError> {
    let value = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::unauthorized("missing x-user-id header"))?;

    let id = value
        .to_str()
        .map_err(|_| AppError::bad_request("invalid x-user-id header"))?
        .trim();
    if id.is_empty() {
        return Err(AppError::unauthorized("empty x-user-id header"));
    }

    Ok(UserId::from(id))
}
