//! The control loop that turns user intent into commands and routes
//! notification outcomes back into observable state.
//!
//! [`Engine`] owns the sync state, the correlation table, and the transport
//! handle, and is the single writer of all of them. Each incoming event
//! (a user intent or a transport event) is handled as one non-preemptible
//! reaction; waiting for a command's outcome is modeled by registering the
//! command in the correlation table and returning immediately.

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{Instrument, debug, info, info_span, trace, warn};

use crate::correlation::{CommandKind, CorrelationTable, Registration};
use crate::protocol::{
    ActionRef, CommandBody, CoordChange, Envelope, ErrorNotification, HighlightTarget,
    Instruction, MessageId, Notification, NotificationBody, Progress,
};
use crate::state::{ErrorRecord, SyncState};
use crate::transport::{Transport, TransportEvent};

/// Errors from the engine frontend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The engine task is gone and can no longer accept intents.
    #[error("Failed to send intent to engine: {0}")]
    IntentSendError(String),
}

/// User intent the engine reacts to.
///
/// A closed set: connection establishment and loss are not intents, they
/// arrive as [`TransportEvent`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Request a fresh tile discovery stream.
    StartDiscovery,
    /// Move a tile to new logical grid coordinates.
    Reposition(CoordChange),
    /// Flash a tile on the physical wall.
    Highlight(HighlightTarget),
    /// Dismiss the recorded error.
    ClearError,
}

impl Intent {
    /// Action description echoed into error records.
    fn action_ref(&self) -> ActionRef {
        match self {
            Intent::StartDiscovery => ActionRef::new("[tiles] requesting tiles from the server"),
            Intent::Reposition(_) => ActionRef::new("[tiles] changing tile coordinates"),
            Intent::Highlight(_) => ActionRef::new("[tiles] highlighting a tile"),
            Intent::ClearError => ActionRef::new("[tiles] clearing the error"),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Route command envelopes are addressed to.
    pub route: String,
    /// Capacity of the intent channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            route: "/v1/lifx/command".to_string(),
            channel_capacity: 100,
        }
    }
}

/// Frontend handle for submitting intents to a running engine.
#[derive(Debug, Clone)]
pub struct Handle {
    intent_tx: mpsc::Sender<Intent>,
}

impl Handle {
    /// Request a fresh discovery stream.
    pub async fn start_discovery(&self) -> crate::Result<()> {
        self.send(Intent::StartDiscovery).await
    }

    /// Move a tile to new logical grid coordinates.
    pub async fn reposition(&self, change: CoordChange) -> crate::Result<()> {
        self.send(Intent::Reposition(change)).await
    }

    /// Flash a tile on the physical wall.
    pub async fn highlight(&self, target: HighlightTarget) -> crate::Result<()> {
        self.send(Intent::Highlight(target)).await
    }

    /// Dismiss the recorded error.
    pub async fn clear_error(&self) -> crate::Result<()> {
        self.send(Intent::ClearError).await
    }

    async fn send(&self, intent: Intent) -> crate::Result<()> {
        self.intent_tx
            .send(intent)
            .await
            .map_err(|e| EngineError::IntentSendError(e.to_string()).into())
    }
}

/// Start an engine on a background task.
///
/// # Arguments
/// * `transport` - The command-submission side of the transport facade
/// * `config` - Engine configuration
/// * `events` - The channel the transport delivers its events on
///
/// # Returns
/// The intent [`Handle`] and a watch receiver carrying state snapshots. A
/// new snapshot is published only when an event actually changed observable
/// state, so no-op updates never wake observers.
pub fn start(
    transport: Box<dyn Transport>,
    config: EngineConfig,
    events: mpsc::Receiver<TransportEvent>,
) -> (Handle, watch::Receiver<SyncState>) {
    let (intent_tx, intent_rx) = mpsc::channel(config.channel_capacity);
    let (state_tx, state_rx) = watch::channel(SyncState::new());

    let engine = Engine::new(transport, config);
    tokio::spawn(engine.run(intent_rx, events, state_tx));

    (Handle { intent_tx }, state_rx)
}

/// The orchestrator: single writer of the sync state and correlation table.
pub struct Engine {
    config: EngineConfig,
    transport: Box<dyn Transport>,
    state: SyncState,
    table: CorrelationTable,
}

impl Engine {
    /// Create an engine with fresh state.
    ///
    /// Use [`start`] to run it on a task; tests can drive the handler entry
    /// points directly.
    pub fn new(transport: Box<dyn Transport>, config: EngineConfig) -> Self {
        Engine {
            config,
            transport,
            state: SyncState::new(),
            table: CorrelationTable::new(),
        }
    }

    /// Current observable state.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Main event loop: one reaction per event, snapshot published on change.
    pub async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut events: mpsc::Receiver<TransportEvent>,
        state_tx: watch::Sender<SyncState>,
    ) {
        async move {
            info!("starting arranger engine");
            loop {
                let changed = tokio::select! {
                    Some(intent) = intents.recv() => self.handle_intent(intent).await,
                    Some(event) = events.recv() => self.handle_transport(event).await,
                    else => {
                        info!("arranger engine shutting down");
                        break;
                    }
                };

                if changed {
                    state_tx.send_replace(self.state.clone());
                }
            }
        }
        .instrument(info_span!("arranger_engine"))
        .await
    }

    /// React to one user intent. Returns whether observable state changed.
    pub async fn handle_intent(&mut self, intent: Intent) -> bool {
        let action = intent.action_ref();
        match intent {
            Intent::StartDiscovery => self.start_discovery(action).await,
            Intent::Reposition(change) => {
                self.dispatch_child(CommandKind::Reposition, CommandBody::ChangeCoords(change), action)
                    .await
            }
            Intent::Highlight(target) => {
                self.dispatch_child(CommandKind::Highlight, CommandBody::Highlight(target), action)
                    .await
            }
            Intent::ClearError => self.state.clear_error(),
        }
    }

    /// React to one transport event. Returns whether observable state changed.
    pub async fn handle_transport(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Connected => {
                debug!("transport connected");
                self.start_discovery(Intent::StartDiscovery.action_ref()).await
            }
            TransportEvent::Dropped => {
                debug!("transport dropped, voiding in-flight commands");
                self.table.clear();
                self.state.connection_reset()
            }
            TransportEvent::Message(notification) => self.route_notification(notification),
        }
    }

    /// Issue a discovery-stream command, unless one is already in flight.
    async fn start_discovery(&mut self, action: ActionRef) -> bool {
        if self.state.loading {
            debug!("discovery already in flight, ignoring");
            return false;
        }

        self.state.begin_loading();

        let message_id = MessageId::mint();
        self.table.register(
            message_id.clone(),
            Registration {
                kind: CommandKind::Discovery,
                original: action.clone(),
                parents: Vec::new(),
            },
        );

        debug!(message_id = %message_id, "requesting discovery stream");
        let submitted = self
            .transport
            .submit(Envelope {
                route: self.config.route.clone(),
                body: CommandBody::StoreTiles,
                message_id: message_id.clone(),
                parent_message_ids: Vec::new(),
                original: action.clone(),
            })
            .await;

        if let Err(e) = submitted {
            warn!(message_id = %message_id, error = %e, "discovery submit failed");
            self.table.deregister(&message_id);
            self.state.discovery_failed(submit_failure(e, action));
        }
        true
    }

    /// Issue a command parented to the active stream; silently drop the
    /// intent when no stream is active.
    async fn dispatch_child(
        &mut self,
        kind: CommandKind,
        body: CommandBody,
        action: ActionRef,
    ) -> bool {
        let Some(parent) = self.state.message_id.clone() else {
            trace!(?kind, "no active stream, dropping command");
            return false;
        };

        let message_id = MessageId::mint();
        self.table.register(
            message_id.clone(),
            Registration {
                kind,
                original: action.clone(),
                parents: vec![parent.clone()],
            },
        );

        debug!(message_id = %message_id, parent = %parent, ?kind, "submitting command");
        let submitted = self
            .transport
            .submit(Envelope {
                route: self.config.route.clone(),
                body,
                message_id: message_id.clone(),
                parent_message_ids: vec![parent],
                original: action.clone(),
            })
            .await;

        match submitted {
            Ok(()) => false,
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "command submit failed");
                self.table.deregister(&message_id);
                self.state.record_error(submit_failure(e, action));
                true
            }
        }
    }

    /// Resolve a notification's token and route its outcome.
    fn route_notification(&mut self, notification: Notification) -> bool {
        let Notification { message_id, body } = notification;

        match body {
            NotificationBody::Success => {
                let Some(registration) = self.table.deregister(&message_id) else {
                    trace!(message_id = %message_id, "success for an unknown token, dropping");
                    return false;
                };
                match registration.kind {
                    CommandKind::Discovery => {
                        debug!(message_id = %message_id, "discovery stream confirmed");
                        self.state.stream_started(message_id)
                    }
                    CommandKind::Reposition | CommandKind::Highlight => false,
                }
            }
            NotificationBody::Progress(progress) => {
                let Some(registration) = self.table.get(&message_id) else {
                    trace!(message_id = %message_id, "progress for an unknown token, dropping");
                    return false;
                };
                if registration.kind != CommandKind::Discovery {
                    trace!(message_id = %message_id, "progress for a command without a progress handler");
                    return false;
                }
                self.stream_progress(message_id, progress)
            }
            NotificationBody::Error(error) => {
                let Some(registration) = self.table.deregister(&message_id) else {
                    trace!(message_id = %message_id, "error for an unknown token, dropping");
                    return false;
                };

                let mut error = error;
                if error.original.is_none() {
                    error.original = Some(registration.original.clone());
                }
                let record = ErrorRecord::from_notification(error);
                warn!(message_id = %message_id, reason = %record.reason, "command failed");

                match registration.kind {
                    CommandKind::Discovery => self.state.discovery_failed(record),
                    CommandKind::Reposition | CommandKind::Highlight => {
                        self.state.record_error(record)
                    }
                }
                true
            }
        }
    }

    /// Route one progress payload from the discovery stream.
    fn stream_progress(&mut self, message_id: MessageId, progress: Progress) -> bool {
        if progress.error.is_some() {
            let Progress {
                error,
                error_code,
                namespace,
                reason,
                ..
            } = progress;

            let record = ErrorRecord::from_notification(ErrorNotification {
                namespace: namespace.unwrap_or_default(),
                error: error.unwrap_or(serde_json::Value::Null),
                error_code,
                reason,
                original: Some(ActionRef::new("[] processing device discovery")),
            });
            warn!(message_id = %message_id, reason = %record.reason, "discovery stream reported an error");
            self.state.record_error(record);
            return true;
        }

        match progress.instruction {
            Some(Instruction::Started) => {
                debug!(message_id = %message_id, "discovery stream started");
                self.state.stream_started(message_id)
            }
            Some(Instruction::Tiles) => match progress.tiles {
                Some(batch) => {
                    let changed = self.state.apply_tiles(&batch);
                    trace!(message_id = %message_id, tiles = batch.len(), changed, "applied tile batch");
                    changed
                }
                None => {
                    trace!(message_id = %message_id, "tiles instruction without a batch, ignoring");
                    false
                }
            },
            Some(Instruction::Unknown) | None => {
                trace!(message_id = %message_id, "unknown instruction, ignoring");
                false
            }
        }
    }
}

/// Error record for a command the transport refused to take.
fn submit_failure(error: crate::transport::TransportError, action: ActionRef) -> ErrorRecord {
    ErrorRecord::from_notification(ErrorNotification {
        namespace: "transport".to_string(),
        error: serde_json::Value::String(error.to_string()),
        error_code: None,
        reason: None,
        original: Some(action),
    })
}
