use chrono::{DateTime, Utc};
use serde_json::{Value as JsonValue, json};
use socketioxide::{
    SocketIo,
    extract::{SocketRef, State, TryData},
};
use tracing::{info, warn};

use chatrelay_core::ids::{ChatRoomId, UserId};

use crate::{socket::rooms, state::AppState};

pub(crate) fn register_namespace(io: &SocketIo) {
    let _ = io.ns("/", on_connect);
}

async fn on_connect(socket: SocketRef) {
    info!(socket_id = %socket.id, "socket connected");

    socket.on("setup", handle_setup);
    socket.on("join", handle_join);
    socket.on("message", handle_message);
    socket.on("delete message", handle_delete_message);
    socket.on("unsend message", handle_unsend_message);
    socket.on("react message", handle_react_message);
    socket.on("call", handle_call);
    socket.on("notify", handle_notify);
    socket.on("accept meeting", handle_accept_meeting);
    socket.on("decline", handle_decline);

    socket.on_disconnect(handle_disconnect);
}

/// Clients historically double-encoded the user id, so the payload may arrive
/// as `"\"u1\""` or as a plain `"u1"`. Unwrap one JSON layer when present.
fn normalize_user_id(value: &JsonValue) -> Option<UserId> {
    let raw = value.as_str()?;
    let id = match serde_json::from_str::<String>(raw) {
        Ok(inner) => inner,
        Err(_) => raw.to_owned(),
    };
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    Some(UserId::from(id))
}

fn chat_room_of(payload: &JsonValue) -> Option<ChatRoomId> {
    let room = payload.get("chatRoomId")?.as_str()?;
    if room.is_empty() {
        return None;
    }
    Some(ChatRoomId::from(room))
}

fn target_user_of(payload: &JsonValue) -> Option<UserId> {
    normalize_user_id(payload.get("userId")?)
}

fn clock_stamp(at: DateTime<Utc>) -> String {
    at.format("%H:%M").to_string()
}

/// Builds the relayed form of a `message` event: the server assigns the
/// delivery timestamp and echoes the client-chosen id alongside the content.
fn relay_message(message: &JsonValue, id: &JsonValue, at: DateTime<Utc>) -> JsonValue {
    let sender_id = message
        .get("senderId")
        .and_then(normalize_user_id)
        .map(|user| user.to_string());

    json!({
        "id": id,
        "senderId": sender_id,
        "content": message.get("content").cloned().unwrap_or(JsonValue::Null),
        "time": clock_stamp(at),
        "type": message.get("type").cloned().unwrap_or(JsonValue::Null),
        "media": message.get("media").cloned().unwrap_or(JsonValue::Null),
    })
}

fn unsend_payload(message: &JsonValue) -> Option<JsonValue> {
    let message_id = message.get("messageId")?.clone();
    Some(json!({ "id": message_id }))
}

async fn handle_setup(
    socket: SocketRef,
    TryData(payload): TryData<JsonValue>,
    State(state): State<AppState>,
) {
    let Ok(payload) = payload else {
        warn!(socket_id = %socket.id, "setup dropped: malformed payload");
        return;
    };
    let Some(user_id) = normalize_user_id(&payload) else {
        warn!(socket_id = %socket.id, "setup dropped: missing user id");
        return;
    };

    state.registry.bind(&socket.id.to_string(), &user_id);
    state.presence.mark_online(&user_id);
    socket.join(rooms::private_channel(&user_id));

    info!(socket_id = %socket.id, user_id = %user_id, "socket bound");

    if let Err(err) = socket.emit("setup", &user_id) {
        warn!(socket_id = %socket.id, error = %err, "setup ack failed");
    }
}

async fn handle_join(
    socket: SocketRef,
    TryData(payload): TryData<(String, JsonValue)>,
    State(state): State<AppState>,
) {
    let Ok((room, _user_id)) = payload else {
        warn!(socket_id = %socket.id, "join dropped: malformed payload");
        return;
    };
    if room.is_empty() {
        warn!(socket_id = %socket.id, "join dropped: empty room");
        return;
    }

    state.registry.join_room(&socket.id.to_string(), &room);
    socket.join(room.clone());

    info!(socket_id = %socket.id, room = %room, "socket joined room");

    if let Err(err) = socket.emit("join", &room) {
        warn!(socket_id = %socket.id, error = %err, "join ack failed");
    }
}

async fn handle_message(
    socket: SocketRef,
    TryData(payload): TryData<(JsonValue, JsonValue)>,
    State(state): State<AppState>,
) {
    let Ok((message, id)) = payload else {
        warn!(socket_id = %socket.id, "message dropped: malformed payload");
        return;
    };
    let Some(chat_room_id) = chat_room_of(&message) else {
        warn!(socket_id = %socket.id, "message dropped: missing chatRoomId");
        return;
    };

    let outgoing = relay_message(&message, &id, Utc::now());

    if let Some(content) = message.get("content").and_then(JsonValue::as_str) {
        state
            .membership
            .set_last_message(&chat_room_id, content)
            .await;
    }

    let room = rooms::chat_room(&chat_room_id);
    if let Err(err) = socket.within(room).emit("message", &outgoing).await {
        warn!(socket_id = %socket.id, chat_room_id = %chat_room_id, error = %err, "message relay failed");
    }
}

async fn handle_delete_message(socket: SocketRef, TryData(payload): TryData<JsonValue>) {
    let Ok(message) = payload else {
        warn!(socket_id = %socket.id, "delete message dropped: malformed payload");
        return;
    };
    let Some(chat_room_id) = chat_room_of(&message) else {
        warn!(socket_id = %socket.id, "delete message dropped: missing chatRoomId");
        return;
    };

    let room = rooms::chat_room(&chat_room_id);
    if let Err(err) = socket.within(room).emit("delete message", &message).await {
        warn!(socket_id = %socket.id, chat_room_id = %chat_room_id, error = %err, "delete relay failed");
    }
}

async fn handle_unsend_message(socket: SocketRef, TryData(payload): TryData<JsonValue>) {
    let Ok(message) = payload else {
        warn!(socket_id = %socket.id, "unsend message dropped: malformed payload");
        return;
    };
    let Some(chat_room_id) = chat_room_of(&message) else {
        warn!(socket_id = %socket.id, "unsend message dropped: missing chatRoomId");
        return;
    };
    let Some(outgoing) = unsend_payload(&message) else {
        warn!(socket_id = %socket.id, "unsend message dropped: missing messageId");
        return;
    };

    let room = rooms::chat_room(&chat_room_id);
    if let Err(err) = socket.within(room).emit("unsend message", &outgoing).await {
        warn!(socket_id = %socket.id, chat_room_id = %chat_room_id, error = %err, "unsend relay failed");
    }
}

async fn handle_react_message(socket: SocketRef, TryData(payload): TryData<JsonValue>) {
    let Ok(message) = payload else {
        warn!(socket_id = %socket.id, "react message dropped: malformed payload");
        return;
    };
    let Some(chat_room_id) = chat_room_of(&message) else {
        warn!(socket_id = %socket.id, "react message dropped: missing chatRoomId");
        return;
    };

    let room = rooms::chat_room(&chat_room_id);
    if let Err(err) = socket.within(room).emit("react message", &message).await {
        warn!(socket_id = %socket.id, chat_room_id = %chat_room_id, error = %err, "react relay failed");
    }
}

async fn handle_call(
    socket: SocketRef,
    TryData(payload): TryData<JsonValue>,
    State(state): State<AppState>,
) {
    let Ok(data) = payload else {
        warn!(socket_id = %socket.id, "call dropped: malformed payload");
        return;
    };
    let Some(chat_room_id) = chat_room_of(&data) else {
        warn!(socket_id = %socket.id, "call dropped: missing chatRoomId");
        return;
    };

    // Meeting creation goes out over the network; run it in its own task so a
    // slow collaborator never stalls the event loop for this connection.
    let meeting = state.meeting.clone();
    let socket = socket.clone();
    let room = rooms::chat_room(&chat_room_id);
    tokio::spawn(async move {
        match meeting.create_meeting().await {
            Ok(meeting_id) => {
                if let Err(err) = socket.within(room).emit("call", &meeting_id).await {
                    warn!(socket_id = %socket.id, chat_room_id = %chat_room_id, error = %err, "call relay failed");
                }
            }
            Err(err) => {
                warn!(socket_id = %socket.id, chat_room_id = %chat_room_id, error = %err, "call dropped: meeting creation failed");
            }
        }
    });
}

async fn handle_notify(socket: SocketRef, TryData(payload): TryData<JsonValue>) {
    let Ok(payload) = payload else {
        warn!(socket_id = %socket.id, event = "notify", "dropped: malformed payload");
        return;
    };
    relay_to_private_channel(&socket, "notify", payload).await;
}

async fn handle_accept_meeting(socket: SocketRef, TryData(payload): TryData<JsonValue>) {
    let Ok(payload) = payload else {
        warn!(socket_id = %socket.id, event = "accept meeting", "dropped: malformed payload");
        return;
    };
    relay_to_private_channel(&socket, "accept meeting", payload).await;
}

async fn handle_decline(socket: SocketRef, TryData(payload): TryData<JsonValue>) {
    let Ok(payload) = payload else {
        warn!(socket_id = %socket.id, event = "decline", "dropped: malformed payload");
        return;
    };
    relay_to_private_channel(&socket, "decline", payload).await;
}

/// Targeted events address a user rather than a chat room; the payload names
/// the recipient and is forwarded unchanged to their private channel. An
/// offline recipient (empty room) is not an error.
async fn relay_to_private_channel(socket: &SocketRef, event: &'static str, payload: JsonValue) {
    let Some(user_id) = target_user_of(&payload) else {
        warn!(socket_id = %socket.id, event, "dropped: missing userId");
        return;
    };

    let room = rooms::private_channel(&user_id);
    if let Err(err) = socket.within(room).emit(event, &payload).await {
        warn!(socket_id = %socket.id, event, user_id = %user_id, error = %err, "relay failed");
    }
}

async fn handle_disconnect(socket: SocketRef, State(state): State<AppState>) {
    let Some(unbound) = state.registry.leave_all(&socket.id.to_string()) else {
        info!(socket_id = %socket.id, "socket disconnected (never bound)");
        return;
    };

    if unbound.last_connection {
        state.presence.mark_offline(&unbound.user_id);
    }

    info!(
        socket_id = %socket.id,
        user_id = %unbound.user_id,
        last_connection = unbound.last_connection,
        "socket disconnected"
    );
}
