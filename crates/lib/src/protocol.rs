//! Wire shapes for the device-control command channel.
//!
//! Transport-agnostic message types exchanged with the device service:
//! outbound command envelopes, and the notifications that come back tagged
//! with the correlation token of the command that caused them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tile::PartialTile;

/// Correlation token binding an outbound command (or a long-lived stream) to
/// its eventual notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Mint a fresh token for a new command.
    pub fn mint() -> Self {
        MessageId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        MessageId(id)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        MessageId(id.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serializable description of the action that triggered a command, echoed
/// back in error notifications for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    /// Tag in the form `"[namespace] explanation"`.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// More specific explanation, when the action carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionRef {
    pub fn new(type_tag: impl Into<String>) -> Self {
        ActionRef {
            type_tag: type_tag.into(),
            reason: None,
        }
    }
}

/// Arguments for a `change_coords` command.
///
/// The service validates the serial format (12 hex characters) and expects
/// integer grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordChange {
    pub serial: String,
    pub tile_index: u32,
    pub left_x: i32,
    pub top_y: i32,
}

/// Arguments for a `highlight` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightTarget {
    pub serial: String,
    pub tile_index: u32,
}

/// The closed set of commands the engine issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args")]
pub enum CommandBody {
    /// Request the long-lived tile discovery stream.
    #[serde(rename = "tiles/store")]
    StoreTiles,
    /// Move a tile to new logical grid coordinates.
    #[serde(rename = "change_coords")]
    ChangeCoords(CoordChange),
    /// Flash a tile so the user can find it on the wall.
    #[serde(rename = "highlight")]
    Highlight(HighlightTarget),
}

/// A command submitted to the transport facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Route the command is addressed to, e.g. `"/v1/lifx/command"`.
    pub route: String,
    pub body: CommandBody,
    /// Locally minted correlation token; notifications echo it.
    pub message_id: MessageId,
    /// Causal lineage for sub-commands of an active stream.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_message_ids: Vec<MessageId>,
    /// The triggering action, echoed back on error.
    pub original: ActionRef,
}

/// Instruction tag on a discovery-stream progress payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    Started,
    Tiles,
    /// Anything this client does not understand yet; ignored.
    #[serde(other)]
    Unknown,
}

/// Progress payload from the discovery stream.
///
/// Error-shaped fields arrive inline when the stream reports a failure
/// instead of an instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<Instruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Vec<PartialTile>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error notification for a rejected or failed command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorNotification {
    /// Subsystem that reported the failure.
    pub namespace: String,
    /// Raw failure payload.
    pub error: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The action that triggered the command, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<ActionRef>,
}

/// The notification shapes the service delivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum NotificationBody {
    /// Terminal acknowledgement that the command completed.
    Success,
    /// Non-terminal progress from a long-lived stream.
    Progress(Progress),
    /// Terminal rejection or failure.
    Error(ErrorNotification),
}

/// A notification delivered by the transport, tagged with the correlation
/// token of the command it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub message_id: MessageId,
    pub body: NotificationBody,
}
