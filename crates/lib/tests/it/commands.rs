//! Stream-scoped commands: preconditions, lineage, and error recording.

use serde_json::json;
use tile_arranger::{
    Intent, SyncState,
    protocol::{CommandBody, CoordChange, ErrorNotification, HighlightTarget},
};

use crate::helpers::*;

fn coord_change() -> CoordChange {
    CoordChange {
        serial: "d073d5000001".to_string(),
        tile_index: 0,
        left_x: 3,
        top_y: -2,
    }
}

fn highlight_target() -> HighlightTarget {
    HighlightTarget {
        serial: "d073d5000001".to_string(),
        tile_index: 0,
    }
}

#[tokio::test]
async fn reposition_before_any_stream_is_a_silent_noop() {
    let (mut engine, transport) = test_engine();

    let changed = engine
        .handle_intent(Intent::Reposition(coord_change()))
        .await;

    assert!(!changed);
    assert!(transport.sent().is_empty());
    assert_eq!(*engine.state(), SyncState::new());
}

#[tokio::test]
async fn highlight_before_any_stream_is_a_silent_noop() {
    let (mut engine, transport) = test_engine();

    let changed = engine
        .handle_intent(Intent::Highlight(highlight_target()))
        .await;

    assert!(!changed);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn reposition_is_parented_to_the_active_stream() {
    let (mut engine, transport, discovery_id) = started_engine().await;

    engine
        .handle_intent(Intent::Reposition(coord_change()))
        .await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    let envelope = &sent[1];
    assert_eq!(envelope.body, CommandBody::ChangeCoords(coord_change()));
    assert_eq!(envelope.parent_message_ids, vec![discovery_id.clone()]);
    assert_ne!(envelope.message_id, discovery_id);
}

#[tokio::test]
async fn every_highlight_occurrence_is_dispatched() {
    let (mut engine, transport, _) = started_engine().await;

    engine
        .handle_intent(Intent::Highlight(highlight_target()))
        .await;
    engine
        .handle_intent(Intent::Highlight(highlight_target()))
        .await;

    let sent = transport.sent();
    assert_eq!(sent.len(), 3);
    assert_ne!(sent[1].message_id, sent[2].message_id);
}

#[tokio::test]
async fn command_errors_are_formatted_and_recorded() {
    let (mut engine, transport, _) = started_engine().await;
    engine
        .handle_intent(Intent::Highlight(highlight_target()))
        .await;
    let highlight_id = transport.sent()[1].message_id.clone();

    let changed = engine
        .handle_transport(command_error(
            &highlight_id,
            ErrorNotification {
                namespace: "lifx".to_string(),
                error: json!({"status": 404}),
                error_code: Some("DeviceOffline".to_string()),
                reason: None,
                original: None,
            },
        ))
        .await;

    assert!(changed);
    let error = engine.state().error.as_ref().expect("error recorded");
    assert_eq!(error.namespace, "lifx");
    assert_eq!(error.reason, "DeviceOffline: Failure while highlighting a tile");
    assert_eq!(error.error, r#"{"status":404}"#);

    // The stream itself is unaffected.
    assert!(engine.state().message_id.is_some());
    assert!(!engine.state().loading);
}

#[tokio::test]
async fn command_success_is_terminal() {
    let (mut engine, transport, _) = started_engine().await;
    engine
        .handle_intent(Intent::Reposition(coord_change()))
        .await;
    let reposition_id = transport.sent()[1].message_id.clone();

    let changed = engine.handle_transport(success(&reposition_id)).await;
    assert!(!changed);

    // A late error for the same token finds nothing to act on.
    let changed = engine
        .handle_transport(command_error(
            &reposition_id,
            ErrorNotification::default(),
        ))
        .await;
    assert!(!changed);
    assert_eq!(engine.state().error, None);
}

#[tokio::test]
async fn clearing_the_error_resets_it_without_side_effects() {
    let (mut engine, transport, discovery_id) = started_engine().await;
    engine
        .handle_intent(Intent::Highlight(highlight_target()))
        .await;
    let highlight_id = transport.sent()[1].message_id.clone();
    engine
        .handle_transport(command_error(&highlight_id, ErrorNotification::default()))
        .await;
    assert!(engine.state().error.is_some());

    let changed = engine.handle_intent(Intent::ClearError).await;
    assert!(changed);
    assert_eq!(engine.state().error, None);
    assert_eq!(engine.state().message_id, Some(discovery_id));

    // Clearing again is a no-op.
    let changed = engine.handle_intent(Intent::ClearError).await;
    assert!(!changed);
}
