//! Wire-frame fixtures
//!
//! JSON frames as the backend emits them on the chat and call feeds.

use serde_json::json;

/// Global online/offline event
pub fn online_status_frame(user_id: i64, user_name: &str, is_online: bool) -> String {
    json!({
        "type": "UserOnlineStatus",
        "user_id": user_id,
        "user_name": user_name,
        "is_online": is_online,
    })
    .to_string()
}

/// Bulk room presence snapshot
pub fn online_users_frame(room_id: i64, users: &[(i64, &str, &str)]) -> String {
    json!({
        "type": "ChatOnlineUsers",
        "room_id": room_id,
        "users": users
            .iter()
            .map(|(id, name, status)| json!({
                "user_id": id,
                "user_name": name,
                "status": status,
            }))
            .collect::<Vec<_>>(),
    })
    .to_string()
}

/// Per-room status delta
pub fn status_update_frame(room_id: i64, user_id: i64, user_name: &str, status: &str) -> String {
    json!({
        "type": "UserStatusUpdate",
        "room_id": room_id,
        "user_id": user_id,
        "user_name": user_name,
        "status": status,
    })
    .to_string()
}

/// Remote typing start/stop
pub fn typing_frame(room_id: i64, user_id: i64, user_name: &str, is_typing: bool) -> String {
    json!({
        "type": "UserTyping",
        "room_id": room_id,
        "user_id": user_id,
        "user_name": user_name,
        "is_typing": is_typing,
    })
    .to_string()
}

/// Authoritative message payload
pub fn message_frame(id: i64, room_id: i64, sender_id: i64, content: &str) -> String {
    json!({
        "type": "chat_message",
        "id": id,
        "room_id": room_id,
        "sender_id": sender_id,
        "sender_name": format!("user{sender_id}"),
        "content": content,
        "sent_at": "2025-03-01T10:00:00Z",
    })
    .to_string()
}

/// Server-initiated keep-alive
pub fn heartbeat_frame() -> String {
    json!({"type": "Heartbeat"}).to_string()
}

/// Call offer on the call feed
pub fn call_offer_frame(from: i64, from_name: &str, to: i64, kind: &str) -> String {
    json!({
        "type": "call-offer",
        "from": from,
        "from_name": from_name,
        "to": to,
        "call_kind": kind,
        "payload": {"sdp": "v=0"},
    })
    .to_string()
}

/// Call teardown signals
pub fn call_ended_frame(from: i64, to: i64) -> String {
    json!({"type": "call-ended", "from": from, "to": to}).to_string()
}

pub fn call_busy_frame(from: i64, to: i64) -> String {
    json!({"type": "call-busy", "from": from, "to": to}).to_string()
}

pub fn call_rejected_frame(from: i64, to: i64) -> String {
    json!({"type": "call-rejected", "from": from, "to": to}).to_string()
}
