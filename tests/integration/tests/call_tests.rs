//! Call-signaling scenarios over the dedicated call feed.

use std::time::Duration;

use integration_tests::*;
use labsync_core::{CallDirection, CallKind, UserId};
use labsync_engine::{CallEndReason, CallState, EngineNotice};

#[tokio::test(start_paused = true)]
async fn test_incoming_offer_rings_then_accept_activates() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "video")).await;
    settle().await;

    let notice = h
        .expect_notice(|n| matches!(n, EngineNotice::IncomingCall { .. }))
        .await;
    assert_eq!(
        notice,
        EngineNotice::IncomingCall {
            from: UserId(9),
            from_name: "park".to_string(),
            kind: CallKind::Video,
        }
    );
    assert!(matches!(h.handle.call_state(), CallState::Incoming(_)));

    h.handle.accept_call().await.unwrap();
    settle().await;

    match h.handle.call_state() {
        CallState::Active(session) => {
            assert_eq!(session.peer_id, UserId(9));
            assert_eq!(session.direction, CallDirection::Incoming);
        }
        other => panic!("expected active call, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_offer_while_active_answers_busy_and_keeps_session() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "audio")).await;
    settle().await;
    h.handle.accept_call().await.unwrap();
    settle().await;
    h.call.drain_outbound();

    // A second caller while the first call is live
    h.call.inject(call_offer_frame(8, "yoon", 1, "audio")).await;
    settle().await;

    let busy = h.call.next_frame_of_type("call-busy").await;
    assert_eq!(busy["from"].as_i64(), Some(1));
    assert_eq!(busy["to"].as_i64(), Some(8));

    // The live session is never replaced
    match h.handle.call_state() {
        CallState::Active(session) => assert_eq!(session.peer_id, UserId(9)),
        other => panic!("expected active call, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_offer_while_incoming_also_answers_busy() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "audio")).await;
    settle().await;
    h.call.drain_outbound();

    h.call.inject(call_offer_frame(8, "yoon", 1, "audio")).await;
    settle().await;

    let busy = h.call.next_frame_of_type("call-busy").await;
    assert_eq!(busy["to"].as_i64(), Some(8));

    match h.handle.call_state() {
        CallState::Incoming(offer) => assert_eq!(offer.from, UserId(9)),
        other => panic!("expected pending offer, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_reject_signals_the_offerer() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "audio")).await;
    settle().await;

    h.handle.reject_call().await.unwrap();
    settle().await;

    let rejected = h.call.next_frame_of_type("call-rejected").await;
    assert_eq!(rejected["from"].as_i64(), Some(1));
    assert_eq!(rejected["to"].as_i64(), Some(9));
    assert!(h.handle.call_state().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_end_resets_to_idle_even_when_send_fails() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "audio")).await;
    settle().await;
    h.handle.accept_call().await.unwrap();
    settle().await;
    assert!(matches!(h.handle.call_state(), CallState::Active(_)));

    // Kill the call feed; the end-signal send will fail with NotConnected
    h.call.close(1006).await;
    h.expect_notice(|n| matches!(n, EngineNotice::FeedDown { feed: "call" }))
        .await;

    h.handle.end_call().await.unwrap();
    settle().await;

    // State reset is unconditional; no zombie session survives the failure
    assert!(h.handle.call_state().is_idle());
    h.expect_notice(|n| {
        matches!(
            n,
            EngineNotice::CallEnded {
                reason: CallEndReason::HungUp
            }
        )
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_initiate_sends_offer_when_peer_available() {
    let mut h = Harness::start().await;

    h.handle
        .initiate_call(UserId(4), "choi", CallKind::Audio)
        .await
        .unwrap();
    settle().await;

    let offer = h.call.next_frame_of_type("call-offer").await;
    assert_eq!(offer["from"].as_i64(), Some(1));
    assert_eq!(offer["to"].as_i64(), Some(4));
    assert_eq!(offer["call_kind"].as_str(), Some("audio"));

    match h.handle.call_state() {
        CallState::Active(session) => {
            assert_eq!(session.peer_id, UserId(4));
            assert_eq!(session.direction, CallDirection::Outgoing);
        }
        other => panic!("expected outgoing call, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_initiate_against_unavailable_peer_stays_idle() {
    let mut h = Harness::start().await;
    h.commands.set_available(false);

    h.handle
        .initiate_call(UserId(4), "choi", CallKind::Audio)
        .await
        .unwrap();
    settle().await;

    h.expect_notice(|n| matches!(n, EngineNotice::CallUnavailable { peer: UserId(4) }))
        .await;
    assert!(h.handle.call_state().is_idle());
    // No offer ever left the machine
    assert!(h
        .call
        .drain_outbound()
        .iter()
        .all(|v| v["type"] != "call-offer"));
}

#[tokio::test(start_paused = true)]
async fn test_peer_busy_collapses_outgoing_call() {
    let mut h = Harness::start().await;

    h.handle
        .initiate_call(UserId(4), "choi", CallKind::Audio)
        .await
        .unwrap();
    settle().await;
    h.call.next_frame_of_type("call-offer").await;

    h.call.inject(call_busy_frame(4, 1)).await;
    settle().await;

    h.expect_notice(|n| {
        matches!(
            n,
            EngineNotice::CallEnded {
                reason: CallEndReason::PeerBusy
            }
        )
    })
    .await;
    assert!(h.handle.call_state().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_peer_rejected_collapses_outgoing_call() {
    let mut h = Harness::start().await;

    h.handle
        .initiate_call(UserId(4), "choi", CallKind::Video)
        .await
        .unwrap();
    settle().await;

    h.call.inject(call_rejected_frame(4, 1)).await;
    settle().await;

    h.expect_notice(|n| {
        matches!(
            n,
            EngineNotice::CallEnded {
                reason: CallEndReason::PeerRejected
            }
        )
    })
    .await;
    assert!(h.handle.call_state().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_peer_hangup_collapses_active_call() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "audio")).await;
    settle().await;
    h.handle.accept_call().await.unwrap();
    settle().await;

    h.call.inject(call_ended_frame(9, 1)).await;
    settle().await;

    h.expect_notice(|n| {
        matches!(
            n,
            EngineNotice::CallEnded {
                reason: CallEndReason::PeerEnded
            }
        )
    })
    .await;
    assert!(h.handle.call_state().is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_signals_between_other_users_are_ignored() {
    let mut h = Harness::start().await;

    h.call.inject(call_offer_frame(9, "park", 1, "audio")).await;
    settle().await;
    h.handle.accept_call().await.unwrap();
    settle().await;

    // A stray teardown from an unrelated user
    h.call.inject(call_ended_frame(7, 1)).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;

    assert!(matches!(h.handle.call_state(), CallState::Active(_)));
}
