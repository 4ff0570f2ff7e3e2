//! End-to-end relay tests: protocol events in, protocol commands out, with
//! the real manager, handler, and session registry in between.

mod common;

use charbridge::backend::ChatError;
use charbridge::session::{CONNECTIVITY_ERROR_REPLY, GENERIC_ERROR_REPLY};

use common::harness;

#[tokio::test]
async fn full_conversation_lifecycle() {
    let mut h = harness().await;

    // First message creates the session
    h.deliver("m1", "42", None, "hello").await;
    let (reply, reply_to) = h.next_reply().await;
    assert_eq!(reply, "echo:hello");
    assert_eq!(reply_to.as_deref(), Some("m1"));
    assert_eq!(h.backend.create_calls(), 1);

    // Second message reuses the conversation
    h.deliver("m2", "42", None, "how are you").await;
    let (reply, _) = h.next_reply().await;
    assert_eq!(reply, "echo:how are you");
    assert_eq!(h.backend.create_calls(), 1);

    // Backend reports the session closed: recreated transparently
    h.backend.script_send(Err(ChatError::SessionClosed));
    h.backend.script_send(Ok("fresh start".to_string()));
    h.deliver("m3", "42", None, "still there?").await;
    let (reply, _) = h.next_reply().await;
    assert_eq!(reply, "fresh start");
    assert_eq!(h.backend.create_calls(), 2);
}

#[tokio::test]
async fn unauthorized_sender_gets_silence() {
    let mut h = harness().await;

    h.deliver("m1", "999", Some("mallory"), "let me in").await;

    h.expect_silence().await;
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn username_allowlist_admits_without_id_match() {
    let mut h = harness().await;

    h.deliver("m1", "999", Some("alice"), "hi").await;

    let (reply, _) = h.next_reply().await;
    assert_eq!(reply, "echo:hi");
}

#[tokio::test]
async fn backend_failure_yields_generic_error_reply() {
    let mut h = harness().await;

    h.deliver("m1", "42", None, "hello").await;
    h.next_reply().await;

    h.backend.script_send(Err(ChatError::Api {
        status: 500,
        message: "upstream broke".to_string(),
    }));
    h.deliver("m2", "42", None, "and now?").await;

    let (reply, _) = h.next_reply().await;
    assert_eq!(reply, GENERIC_ERROR_REPLY);

    // The session survived the failure
    assert_eq!(h.registry.len().await, 1);
    assert_eq!(h.backend.create_calls(), 1);
}

#[tokio::test]
async fn failed_recovery_yields_connectivity_reply() {
    let mut h = harness().await;

    h.deliver("m1", "42", None, "hello").await;
    h.next_reply().await;

    h.backend.script_send(Err(ChatError::SessionClosed));
    h.backend.script_send(Err(ChatError::Api {
        status: 502,
        message: "still down".to_string(),
    }));
    h.deliver("m2", "42", None, "anyone home?").await;

    let (reply, _) = h.next_reply().await;
    assert_eq!(reply, CONNECTIVITY_ERROR_REPLY);
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn shutdown_closes_sessions_and_stops_gateway() {
    let mut h = harness().await;

    h.deliver("m1", "42", None, "hello").await;
    h.next_reply().await;

    // Simulate the gateway going away, then shut everything down
    drop(h.evt_tx);
    h.gateways.shutdown().await;

    let report = h.registry.shutdown().await;
    assert_eq!(report.closed, 1);
    assert!(report.failed.is_empty());
    assert_eq!(h.backend.close_calls(), 1);
    assert!(h.registry.is_empty().await);
}
