//! The narrow contract between the engine and the connection owner.
//!
//! The transport owns the connection lifecycle, reconnection policy, and the
//! wire encoding of individual frames. The engine only hands it fully-built
//! command envelopes and receives [`TransportEvent`]s on the channel given
//! at engine start.

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{Envelope, Notification};

/// Errors surfaced by a transport when submitting a command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The connection is not currently usable.
    #[error("Transport not connected: {0}")]
    NotConnected(String),

    /// The command could not be written to the connection.
    #[error("Failed to submit command: {0}")]
    SubmitFailed(String),
}

/// Events the transport delivers into the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection was (re)established; discovery restarts.
    Connected,
    /// The connection went away; in-flight commands are void.
    Dropped,
    /// A notification correlated to an outstanding command.
    Message(Notification),
}

/// Command-submission side of the transport facade.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit a command envelope for delivery to the device service.
    ///
    /// Submission is fire-and-forget: outcomes arrive later as
    /// [`TransportEvent::Message`]s tagged with the envelope's token.
    async fn submit(&self, envelope: Envelope) -> Result<(), TransportError>;
}
