use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tile_arranger::{
    Engine, EngineConfig,
    protocol::{
        Envelope, ErrorNotification, Instruction, MessageId, Notification, NotificationBody,
        Progress,
    },
    transport::{Transport, TransportError, TransportEvent},
};

/// Transport stub that records every submitted envelope.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    envelopes: Arc<Mutex<Vec<Envelope>>>,
    fail_next: Arc<Mutex<Option<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every envelope submitted so far.
    pub fn sent(&self) -> Vec<Envelope> {
        self.envelopes.lock().unwrap().clone()
    }

    /// Make the next submit fail with the given message.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn submit(&self, envelope: Envelope) -> Result<(), TransportError> {
        if let Some(message) = self.fail_next.lock().unwrap().take() {
            return Err(TransportError::SubmitFailed(message));
        }
        self.envelopes.lock().unwrap().push(envelope);
        Ok(())
    }
}

/// An engine driven directly, without a spawned task.
pub fn test_engine() -> (Engine, RecordingTransport) {
    let transport = RecordingTransport::new();
    let engine = Engine::new(Box::new(transport.clone()), EngineConfig::default());
    (engine, transport)
}

/// An engine that has issued a discovery command; returns its token.
pub async fn connected_engine() -> (Engine, RecordingTransport, MessageId) {
    let (mut engine, transport) = test_engine();
    engine.handle_transport(TransportEvent::Connected).await;
    let discovery_id = transport.sent()[0].message_id.clone();
    (engine, transport, discovery_id)
}

/// An engine with a confirmed discovery stream.
pub async fn started_engine() -> (Engine, RecordingTransport, MessageId) {
    let (mut engine, transport, discovery_id) = connected_engine().await;
    engine.handle_transport(started(&discovery_id)).await;
    (engine, transport, discovery_id)
}

pub fn success(message_id: &MessageId) -> TransportEvent {
    TransportEvent::Message(Notification {
        message_id: message_id.clone(),
        body: NotificationBody::Success,
    })
}

pub fn progress(message_id: &MessageId, progress: Progress) -> TransportEvent {
    TransportEvent::Message(Notification {
        message_id: message_id.clone(),
        body: NotificationBody::Progress(progress),
    })
}

pub fn started(message_id: &MessageId) -> TransportEvent {
    progress(
        message_id,
        Progress {
            instruction: Some(Instruction::Started),
            ..Progress::default()
        },
    )
}

pub fn tiles(message_id: &MessageId, batch: Vec<tile_arranger::PartialTile>) -> TransportEvent {
    progress(
        message_id,
        Progress {
            instruction: Some(Instruction::Tiles),
            tiles: Some(batch),
            ..Progress::default()
        },
    )
}

pub fn command_error(message_id: &MessageId, error: ErrorNotification) -> TransportEvent {
    TransportEvent::Message(Notification {
        message_id: message_id.clone(),
        body: NotificationBody::Error(error),
    })
}

/// Poll until `predicate` holds; panics after ~500ms.
pub async fn wait_until(mut predicate: impl FnMut() -> bool) {
    for _ in 0..100 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
