//! Engine scenarios: feeds, dispatch, presence, typing, and rooms.

use std::time::Duration;

use integration_tests::*;
use labsync_core::{RoomId, UserId};
use labsync_engine::EngineNotice;

#[tokio::test(start_paused = true)]
async fn test_server_heartbeat_is_acked_immediately() {
    let mut h = Harness::start().await;

    h.chat.drain_outbound();
    h.chat.inject(heartbeat_frame()).await;
    settle().await;

    let types: Vec<String> = h
        .chat
        .drain_outbound()
        .iter()
        .map(|v| v["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["Heartbeat"]);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_heartbeat_fires_on_interval() {
    let mut h = Harness::start().await;

    h.chat.drain_outbound();
    tokio::time::sleep(Duration::from_secs(31)).await;
    settle().await;

    let frames = h.chat.drain_outbound();
    assert!(frames.iter().any(|v| v["type"] == "Heartbeat"));
}

#[tokio::test(start_paused = true)]
async fn test_room_open_joins_and_requests_presence() {
    let mut h = Harness::start().await;

    h.handle.set_active_room(Some(RoomId(5))).await.unwrap();
    settle().await;

    let join = h.chat.next_frame_of_type("JoinChat").await;
    assert_eq!(join["room_id"].as_i64(), Some(5));
    assert_eq!(join["user_id"].as_i64(), Some(1));

    let request = h.chat.next_frame_of_type("RequestOnlineUsers").await;
    assert_eq!(request["room_id"].as_i64(), Some(5));
}

#[tokio::test(start_paused = true)]
async fn test_room_snapshot_populates_presence() {
    let mut h = Harness::start().await;

    h.handle.set_active_room(Some(RoomId(5))).await.unwrap();
    settle().await;
    h.chat.drain_outbound();

    h.chat
        .inject(online_users_frame(
            5,
            &[(1, "me", "online"), (2, "kim", "online"), (3, "lee", "offline")],
        ))
        .await;
    settle().await;

    // The local user is excluded from the count
    assert_eq!(h.handle.online_count(), 1);
    assert!(h.handle.presence().is_online(UserId(2)));
    assert!(!h.handle.presence().is_online(UserId(3)));
    // Offline members still render with a last-seen timestamp
    assert!(h.handle.presence().presence(UserId(3)).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_guard_window_drops_burst_second_frame() {
    let mut h = Harness::start().await;

    // Two frames back-to-back: the second lands inside the 100ms guard
    // window and is intentionally lost, not queued.
    h.chat.inject(online_status_frame(7, "ahn", true)).await;
    h.chat.inject(online_status_frame(8, "bae", true)).await;
    settle().await;

    assert!(h.handle.presence().is_online(UserId(7)));
    assert!(!h.handle.presence().is_online(UserId(8)));

    // Past the window the same frame is admitted normally
    clear_guard_window().await;
    h.chat.inject(online_status_frame(8, "bae", true)).await;
    settle().await;
    assert!(h.handle.presence().is_online(UserId(8)));
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_reconnects_after_fixed_delay() {
    let mut h = Harness::start().await;
    let mut chat2 = h.chat_dialer.push_socket();

    h.handle.set_active_room(Some(RoomId(5))).await.unwrap();
    settle().await;
    assert_eq!(h.chat_dialer.dial_count(), 1);

    h.chat.close(1006).await;
    h.expect_notice(|n| matches!(n, EngineNotice::FeedDown { feed: "chat" }))
        .await;

    // Inside the 3s delay: no redial yet
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.chat_dialer.dial_count(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(h.chat_dialer.dial_count(), 2);
    h.expect_notice(|n| matches!(n, EngineNotice::FeedUp { feed: "chat" }))
        .await;

    // The open room is rejoined and its presence re-requested
    let join = chat2.next_frame_of_type("JoinChat").await;
    assert_eq!(join["room_id"].as_i64(), Some(5));
    chat2.next_frame_of_type("RequestOnlineUsers").await;
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_never_reconnects() {
    let h = Harness::start().await;

    h.chat.close(1000).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(h.chat_dialer.dial_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_room_switch_sends_exactly_one_typing_stop() {
    let mut h = Harness::start().await;

    h.handle.set_active_room(Some(RoomId(1))).await.unwrap();
    settle().await;
    h.chat.drain_outbound();

    h.handle.keystroke().await.unwrap();
    settle().await;
    let start = h.chat.next_frame_of_type("TypingStart").await;
    assert_eq!(start["room_id"].as_i64(), Some(1));

    // Switch before the 3s idle timer fires
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.handle.set_active_room(Some(RoomId(2))).await.unwrap();
    settle().await;

    let frames = h.chat.drain_outbound();
    let stops: Vec<i64> = frames
        .iter()
        .filter(|v| v["type"] == "TypingStop")
        .map(|v| v["room_id"].as_i64().unwrap())
        .collect();
    assert_eq!(stops, vec![1]);
    // No typing signal for room 2 merely from the switch
    assert!(!frames
        .iter()
        .any(|v| v["type"] == "TypingStart" && v["room_id"].as_i64() == Some(2)));
    // The stop went out before we left the room
    let stop_pos = frames.iter().position(|v| v["type"] == "TypingStop").unwrap();
    let leave_pos = frames.iter().position(|v| v["type"] == "LeaveChat").unwrap();
    assert!(stop_pos < leave_pos);

    // The cancelled idle timer must not emit a late stop
    tokio::time::sleep(Duration::from_secs(5)).await;
    settle().await;
    assert!(h
        .chat
        .drain_outbound()
        .iter()
        .all(|v| v["type"] != "TypingStop"));
}

#[tokio::test(start_paused = true)]
async fn test_send_message_goes_through_command_channel() {
    let mut h = Harness::start().await;

    h.handle.set_active_room(Some(RoomId(1))).await.unwrap();
    settle().await;
    h.chat.drain_outbound();

    h.handle.keystroke().await.unwrap();
    h.handle.send_message("sample ready").await.unwrap();
    settle().await;

    // Typing stops immediately, bypassing the idle timer
    let frames = h.chat.drain_outbound();
    assert!(frames.iter().any(|v| v["type"] == "TypingStop"));

    let sent = h.commands.sent_payloads();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("\"content\":\"sample ready\""));
    assert!(sent[0].contains("\"type\":\"chat_message\""));
}

#[tokio::test(start_paused = true)]
async fn test_inbound_message_appended_and_deduped() {
    let mut h = Harness::start().await;

    h.handle.set_active_room(Some(RoomId(5))).await.unwrap();
    settle().await;

    h.chat.inject(message_frame(100, 5, 2, "results in")).await;
    settle().await;

    assert_eq!(h.handle.messages().len(), 1);
    h.expect_notice(|n| {
        matches!(
            n,
            EngineNotice::MessageReceived { room_id: RoomId(5), .. }
        )
    })
    .await;

    // The duplicate (same message id) arriving later is dropped
    clear_guard_window().await;
    h.chat.inject(message_frame(100, 5, 2, "results in")).await;
    settle().await;
    assert_eq!(h.handle.messages().len(), 1);

    // A message for another room only bumps that room's unread count
    clear_guard_window().await;
    h.chat.inject(message_frame(101, 6, 2, "elsewhere")).await;
    settle().await;
    assert_eq!(h.handle.messages().len(), 1);
    assert_eq!(h.handle.unread_total(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_typing_tracked_per_room() {
    let mut h = Harness::start().await;

    h.handle.set_active_room(Some(RoomId(5))).await.unwrap();
    settle().await;

    h.chat.inject(typing_frame(5, 2, "kim", true)).await;
    settle().await;
    assert!(h.handle.typing().is_typing(UserId(2)));

    clear_guard_window().await;
    h.chat.inject(typing_frame(5, 2, "kim", false)).await;
    settle().await;
    assert!(!h.handle.typing().is_typing(UserId(2)));
}

#[tokio::test(start_paused = true)]
async fn test_legacy_and_unknown_frames_do_not_disrupt() {
    let mut h = Harness::start().await;

    h.chat.inject("Connected to chat server").await;
    settle().await;

    clear_guard_window().await;
    h.chat.inject(r#"{"type":"SomethingFromTheFuture"}"#).await;
    settle().await;

    clear_guard_window().await;
    h.chat.inject("%%% not json %%%").await;
    settle().await;

    // The engine is still healthy and dispatching
    clear_guard_window().await;
    h.chat.inject(online_status_frame(2, "kim", true)).await;
    settle().await;
    assert!(h.handle.presence().is_online(UserId(2)));
}

#[tokio::test(start_paused = true)]
async fn test_attachment_roundtrip_via_command_channel() {
    let h = Harness::start().await;

    let bytes = b"%PDF-1.4 report".to_vec();
    let file_id = h.handle.upload_attachment("report.pdf", &bytes).await.unwrap();
    let downloaded = h.handle.download_attachment(&file_id).await.unwrap();
    assert_eq!(downloaded, bytes);
}
