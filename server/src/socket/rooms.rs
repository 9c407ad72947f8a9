use chatrelay_core::ids::{ChatRoomId, UserId};

/// Room carrying a group's chat traffic. The id is the chat room id itself;
/// clients join it with the `join` event.
pub fn chat_room(chat_room_id: &ChatRoomId) -> String {
    chat_room_id.to_string()
}

/// Per-user notification channel. The room name is the user id, so targeted
/// notifications address a user without knowing their connections.
pub fn private_channel(user_id: &UserId) -> String {
    user_id.to_string()
}
