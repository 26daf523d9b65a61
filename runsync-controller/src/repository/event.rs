//! Event Repository
//!
//! Records user-visible events without blocking the caller. `emit` pushes the
//! event onto a channel; a single background writer drains it into a sink.
//! [`EventWriter::finish`] waits until every queued event has been written,
//! so short-lived commands can flush before the runtime goes away.

use async_trait::async_trait;
use chrono::Utc;
use runsync_core::domain::event::{Event, EventType, InvolvedObject};
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{EventRecorder, StoreError};

/// Destination the background writer persists events to
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn write(&self, event: &Event) -> Result<(), StoreError>;
}

/// PostgreSQL implementation of [`EventSink`]
#[derive(Debug, Clone)]
pub struct PgEventSink {
    pool: PgPool,
}

impl PgEventSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for PgEventSink {
    async fn write(&self, event: &Event) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO events (kind, namespace, name, event_type, reason, message, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&event.involved_object.kind)
        .bind(&event.involved_object.key.namespace)
        .bind(&event.involved_object.key.name)
        .bind(event.event_type.to_string())
        .bind(&event.reason)
        .bind(&event.message)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// [`EventRecorder`] that logs each event and queues it for the writer
#[derive(Debug, Clone)]
pub struct QueuedEventRecorder {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventRecorder for QueuedEventRecorder {
    fn emit(&self, object: &InvolvedObject, event_type: EventType, reason: &str, message: &str) {
        match event_type {
            EventType::Normal => {
                tracing::info!("{} {} {}: {}", object.kind, object.key, reason, message)
            }
            EventType::Warning => {
                tracing::warn!("{} {} {}: {}", object.kind, object.key, reason, message)
            }
        }

        let event = Event {
            involved_object: object.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        };

        if self.sender.send(event).is_err() {
            tracing::warn!("Event writer has stopped, dropping event {} for {}", reason, object.key);
        }
    }
}

/// Handle on the background event writer
pub struct EventWriter {
    handle: JoinHandle<usize>,
}

impl EventWriter {
    /// Waits for the writer to drain the queue and stop
    ///
    /// The writer stops once every [`QueuedEventRecorder`] clone has been
    /// dropped, so drop them (and whatever owns them) first. Returns the
    /// number of events written.
    pub async fn finish(self) -> usize {
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!("Event writer task failed: {}", e);
                0
            }
        }
    }
}

/// Starts the background writer and returns the recorder feeding it
///
/// Must be called from within a tokio runtime.
pub fn spawn_event_writer(sink: impl EventSink) -> (QueuedEventRecorder, EventWriter) {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Event>();

    let handle = tokio::spawn(async move {
        let mut written = 0;
        while let Some(event) = receiver.recv().await {
            match sink.write(&event).await {
                Ok(()) => written += 1,
                Err(e) => tracing::warn!(
                    "Failed to record event {} for {}: {}",
                    event.reason,
                    event.involved_object.key,
                    e
                ),
            }
        }
        written
    });

    (QueuedEventRecorder { sender }, EventWriter { handle })
}
