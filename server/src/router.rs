// Router configuration

use axum::{
    Json, Router,
    http::Method,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    group::handlers::{
        add_members_handler, create_group_handler, get_group_handler, leave_group_handler,
        list_groups_handler, remove_member_handler,
    },
    state::AppState,
};

pub fn build_router(state: AppState) -> Router {
    let (socket_layer, _io) = crate::socket::build_socket_layer(state.clone());

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request());

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/groups",
            post(create_group_handler).get(list_groups_handler),
        )
        .route("/groups/{group_id}", get(get_group_handler))
        .route(
            "/groups/{group_id}/members",
            post(add_members_handler).delete(remove_member_handler),
        )
        .route("/groups/{group_id}/leave", post(leave_group_handler))
        .layer(socket_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
