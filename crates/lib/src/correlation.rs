//! In-flight command correlation.
//!
//! Every submitted command registers here under its correlation token.
//! Notifications coming back from the transport are only acted on when the
//! token is still registered; anything else is stale (superseded or already
//! terminal) and dropped silently.

use std::collections::HashMap;

use tracing::trace;

use crate::protocol::{ActionRef, MessageId};

/// Which orchestrated command a registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// The long-lived tile discovery stream.
    Discovery,
    /// A coordinate change parented to the active stream.
    Reposition,
    /// A highlight parented to the active stream.
    Highlight,
}

impl CommandKind {
    /// Whether a new command of this kind cancels interest in the outcomes
    /// of any previous one still outstanding.
    pub fn is_latest_only(self) -> bool {
        matches!(self, CommandKind::Discovery)
    }
}

/// Ephemeral binding from a message identifier to the action that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub kind: CommandKind,
    /// The action that triggered the command, echoed into error records.
    pub original: ActionRef,
    /// Message ids of the stream this command is scoped under.
    pub parents: Vec<MessageId>,
}

/// Table of outstanding commands keyed by correlation token.
///
/// Entries are created per command submission and removed on a terminal
/// outcome, on supersession, or when the connection drops. Progress
/// notifications leave the entry in place.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    entries: HashMap<MessageId, Registration>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a submitted command.
    ///
    /// For latest-only kinds this first cancels any previous registration of
    /// the same kind, so notifications for the superseded command find
    /// nothing to act on.
    pub fn register(&mut self, message_id: MessageId, registration: Registration) {
        if registration.kind.is_latest_only() {
            self.supersede(registration.kind);
        }
        self.entries.insert(message_id, registration);
    }

    /// Look up the owner of a non-terminal notification.
    pub fn get(&self, message_id: &MessageId) -> Option<&Registration> {
        self.entries.get(message_id)
    }

    /// Remove and return the owner of a terminal notification.
    pub fn deregister(&mut self, message_id: &MessageId) -> Option<Registration> {
        self.entries.remove(message_id)
    }

    /// Void every outstanding registration.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn supersede(&mut self, kind: CommandKind) {
        self.entries.retain(|message_id, registration| {
            let stale = registration.kind == kind;
            if stale {
                trace!(message_id = %message_id, ?kind, "superseding stale registration");
            }
            !stale
        });
    }
}
