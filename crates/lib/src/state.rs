//! Externally-observable synchronized state and error records.
//!
//! `SyncState` is the view the rendering side reads. It is derived purely
//! from the sequence of events the engine has handled; the engine is its
//! only writer, and every mutation happens inside one atomic reaction to a
//! single event.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::{ActionRef, ErrorNotification, MessageId};
use crate::tile::{PartialTile, Tile, merge};

/// Last unrecovered failure, kept until explicitly cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Subsystem that reported the failure.
    pub namespace: String,
    /// Human-readable derived explanation.
    pub reason: String,
    /// Raw failure payload, rendered as text.
    pub error: String,
    /// The action that triggered the failed command, for diagnostic replay.
    pub original: ActionRef,
}

impl ErrorRecord {
    /// Build a record from an error notification.
    ///
    /// Total for any input: missing pieces degrade to empty strings rather
    /// than failing. The reason is the explicit one when supplied, otherwise
    /// the original action's own reason, otherwise its type tag with the
    /// leading `"[namespace] "` prefix stripped. The final reason is
    /// prefixed with `"{error_code}: Failure while "`.
    ///
    /// # Arguments
    /// * `notification` - The error payload as delivered by the transport
    pub fn from_notification(notification: ErrorNotification) -> Self {
        let ErrorNotification {
            namespace,
            error,
            error_code,
            reason,
            original,
        } = notification;

        let original = original.unwrap_or_else(|| ActionRef::new(""));

        let reason = reason
            .or_else(|| original.reason.clone())
            .unwrap_or_else(|| strip_namespace_tag(&original.type_tag).to_string());
        let code = error_code.unwrap_or_default();

        ErrorRecord {
            namespace,
            reason: format!("{code}: Failure while {reason}"),
            error: render_payload(error),
            original,
        }
    }
}

/// Drop a leading `"[namespace] "` tag from an action type, when present.
fn strip_namespace_tag(type_tag: &str) -> &str {
    match type_tag.find("] ") {
        Some(at) => &type_tag[at + 2..],
        None => type_tag,
    }
}

/// Render a failure payload as text; non-string values keep their JSON form.
fn render_payload(error: Value) -> String {
    match error {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// The synchronized view of the tile wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Known tiles in arrival/merge order, not spatial order.
    pub tiles: Vec<Tile>,
    /// True while a discovery stream is outstanding and not yet confirmed
    /// started.
    pub loading: bool,
    /// Identifier of the active discovery stream, once confirmed started.
    pub message_id: Option<MessageId>,
    /// Last unrecovered error; cleared explicitly, never auto-expires.
    pub error: Option<ErrorRecord>,
    /// True until the first tile batch of the session has been applied.
    pub waiting: bool,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        SyncState {
            tiles: Vec::new(),
            loading: false,
            message_id: None,
            error: None,
            waiting: true,
        }
    }

    /// A discovery command is about to be issued: drop stale state.
    pub(crate) fn begin_loading(&mut self) {
        self.loading = true;
        self.error = None;
        self.tiles.clear();
        self.message_id = None;
    }

    /// The discovery stream confirmed it is running under `message_id`.
    ///
    /// Returns whether anything observable changed; repeated confirmations
    /// for the same stream are no-ops.
    pub(crate) fn stream_started(&mut self, message_id: MessageId) -> bool {
        let confirmed = Some(message_id);
        let changed = self.loading || self.message_id != confirmed;
        self.loading = false;
        self.message_id = confirmed;
        changed
    }

    /// Merge a tile batch into the collection.
    ///
    /// Returns whether anything observable changed, either the collection
    /// itself or the first-batch `waiting` flag.
    pub(crate) fn apply_tiles(&mut self, batch: &[PartialTile]) -> bool {
        let first_batch = std::mem::replace(&mut self.waiting, false);
        let merged = match merge(batch, &self.tiles) {
            Cow::Borrowed(_) => return first_batch,
            Cow::Owned(next) => next,
        };
        self.tiles = merged;
        true
    }

    /// Record a command failure. Tiles are left untouched.
    pub(crate) fn record_error(&mut self, record: ErrorRecord) {
        self.error = Some(record);
    }

    /// The discovery command failed terminally: the stream is no longer
    /// outstanding, so a new discovery may be issued.
    pub(crate) fn discovery_failed(&mut self, record: ErrorRecord) {
        self.error = Some(record);
        self.loading = false;
        self.message_id = None;
    }

    /// Dismiss the recorded error. Returns whether one was present.
    pub(crate) fn clear_error(&mut self) -> bool {
        self.error.take().is_some()
    }

    /// The transport connection went away; in-flight work is void.
    ///
    /// No error record is kept; the condition is transient and reconnection
    /// restarts discovery.
    pub(crate) fn connection_reset(&mut self) -> bool {
        let changed = self.loading || self.message_id.is_some() || !self.tiles.is_empty();
        self.loading = false;
        self.tiles.clear();
        self.message_id = None;
        changed
    }
}
