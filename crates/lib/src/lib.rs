//! Client-side synchronization engine for an interactive tile-arrangement
//! tool driving addressable LED panels.
//!
//! The engine keeps a local view of tile state synchronized with a remote
//! device-control service reachable only through an asynchronous, multiplexed
//! message stream. It merges incrementally-arriving partial tile records into
//! a stable collection without spurious change notifications, issues commands
//! over a single shared channel, and correlates each command's eventual
//! success/progress/error notifications back to the action that triggered it.
//!
//! ## Core Concepts
//!
//! * **Tiles (`tile::Tile`)**: One record per physical panel, accumulated
//!   from partial updates. `tile::merge` reconciles an incoming batch against
//!   the known set and reports no-ops referentially.
//! * **Sync state (`state::SyncState`)**: The externally-observable view
//!   (the tile collection, loading/error flags, and the active stream
//!   identifier), derived purely from the event sequence the engine has seen.
//! * **Correlation (`correlation::CorrelationTable`)**: Bindings from
//!   in-flight message identifiers to the actions that own them, used to
//!   decide whether a late-arriving notification should still be applied.
//! * **Engine (`engine::Engine`)**: The control loop reacting to user intents
//!   and transport events; the single writer of all engine state.
//! * **Transport (`transport::Transport`)**: The narrow contract to the
//!   connection owner. The engine hands it command envelopes and receives
//!   [`transport::TransportEvent`]s; connection lifecycle, reconnection, and
//!   frame encoding live on the other side of this trait.
//!
//! Rendering and gesture capture are external collaborators: they observe
//! [`SyncState`] snapshots and feed intents back through [`engine::Handle`].

pub mod correlation;
pub mod engine;
pub mod protocol;
pub mod state;
pub mod tile;
pub mod transport;

pub use engine::{Engine, EngineConfig, Handle, Intent};
pub use protocol::MessageId;
pub use state::{ErrorRecord, SyncState};
pub use tile::{PartialTile, Tile};
pub use transport::{Transport, TransportEvent};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured engine errors from the engine module
    #[error(transparent)]
    Engine(#[from] engine::EngineError),

    /// Structured transport errors from the transport module
    #[error(transparent)]
    Transport(#[from] transport::TransportError),
}

impl Error {
    /// Check if this is an engine error.
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Error::Engine(_))
    }

    /// Check if this is a transport error.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
