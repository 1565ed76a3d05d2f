//! Event emitter.
//!
//! Mutating operations record [`DomainEvent`]s in the `event_log` table inside
//! their transaction (the outbox). Only after commit are the events handed to
//! the in-process broadcast bus and to every registered
//! [`NotificationTransport`]. A rolled-back operation therefore never
//! announces anything.
//!
//! # Guarantees
//!
//! - **Durable log**: `event_log` holds every committed event.
//! - **At-most-once live delivery**: slow bus subscribers may lag and miss
//!   events; they can catch up from the log via `query_events`.
//! - **Transport isolation**: a failing transport is logged and skipped; it
//!   never fails the operation that produced the event.
//! - **Commit order**: events are staged in commit order while the
//!   operation still holds its keys, then delivered to transports after the
//!   keys are released. One delivery runs at a time and drains the staged
//!   queue front to back, so transports see events in the order they were
//!   committed.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thesis_core::entities::DomainEvent;
use thesis_core::enums::{EntityType, EventType};
use thesis_core::ids::PREFIX_EVENT;
use tokio::sync::broadcast;

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, generate_id};

/// Default channel capacity for the event bus.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Delivery of events to the outside world (mail, push, chat...).
pub trait NotificationTransport: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Deliver one committed event.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if delivery fails. The error is logged only.
    fn publish(&self, event: &DomainEvent) -> Result<(), DatabaseError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl NotificationTransport for NullTransport {
    fn name(&self) -> &str {
        "null"
    }

    fn publish(&self, _event: &DomainEvent) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Appends events to a JSON-lines file, one event per line.
pub struct JsonlTransport {
    path: PathBuf,
}

impl JsonlTransport {
    /// Create the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Io` if the directory cannot be created.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DatabaseError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationTransport for JsonlTransport {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), DatabaseError> {
        serde_jsonlines::append_json_lines(&self.path, [event])?;
        Ok(())
    }
}

/// Keeps every event in memory. For tests and embedding hosts that poll.
#[derive(Default)]
pub struct RecordingTransport {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn types(&self) -> Vec<EventType> {
        self.events().iter().map(|e| e.event_type).collect()
    }
}

impl NotificationTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    fn publish(&self, event: &DomainEvent) -> Result<(), DatabaseError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Broadcast bus plus the registered transports.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<DomainEvent>,
    transports: Arc<Mutex<Vec<Arc<dyn NotificationTransport>>>>,
    staged: Arc<Mutex<VecDeque<DomainEvent>>>,
    delivery: Arc<tokio::sync::Mutex<()>>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl EventEmitter {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            transports: Arc::new(Mutex::new(Vec::new())),
            staged: Arc::new(Mutex::new(VecDeque::new())),
            delivery: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Receive every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn add_transport(&self, transport: Arc<dyn NotificationTransport>) {
        self.transports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(transport);
    }

    /// Broadcast committed events and queue them for the transports.
    ///
    /// Only in-memory work; callers stage while still holding their keys.
    pub fn stage(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        let mut staged = self.staged.lock().unwrap_or_else(PoisonError::into_inner);
        for event in events {
            // No subscribers is not an error.
            let _ = self.sender.send(event.clone());
            staged.push_back(event);
        }
    }

    /// Drain the staged queue into every transport.
    pub async fn deliver(&self) {
        let _delivery = self.delivery.lock().await;
        let transports = self
            .transports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        loop {
            let batch: Vec<DomainEvent> = self
                .staged
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
                .collect();
            if batch.is_empty() {
                return;
            }
            for event in &batch {
                for transport in &transports {
                    if let Err(error) = transport.publish(event) {
                        tracing::error!(
                            transport = transport.name(),
                            event_id = %event.id,
                            %error,
                            "notification transport failed"
                        );
                    }
                }
            }
        }
    }

    /// Stage and deliver in one step.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        self.stage(events);
        self.deliver().await;
    }
}

/// Events recorded by one transaction, published after it commits.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<DomainEvent>,
}

/// Fields of an event that the outbox cannot derive.
pub struct EventDraft<'a> {
    pub event_type: EventType,
    pub subject_type: EntityType,
    pub subject_id: &'a str,
    pub actor_id: &'a str,
    pub detail: Option<serde_json::Value>,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the event to `event_log` on `conn` and queue it for publishing.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the INSERT fails.
    pub async fn record(
        &mut self,
        conn: &libsql::Connection,
        draft: EventDraft<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let id = generate_id(conn, PREFIX_EVENT).await?;
        let detail = draft.detail.as_ref().map(ToString::to_string);
        conn.execute(
            "INSERT INTO event_log (id, event_type, subject_type, subject_id, actor_id, detail, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            libsql::params![
                id.as_str(),
                draft.event_type.as_str(),
                draft.subject_type.as_str(),
                draft.subject_id,
                draft.actor_id,
                detail.as_deref(),
                fmt_datetime(&now)
            ],
        )
        .await?;

        self.events.push(DomainEvent {
            id,
            event_type: draft.event_type,
            subject_type: draft.subject_type,
            subject_id: draft.subject_id.to_string(),
            actor_id: draft.actor_id.to_string(),
            detail: draft.detail,
            timestamp: now,
        });
        Ok(())
    }

    #[must_use]
    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    #[must_use]
    pub fn into_events(self) -> Vec<DomainEvent> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, event_type: EventType) -> DomainEvent {
        DomainEvent {
            id: id.into(),
            event_type,
            subject_type: EntityType::Application,
            subject_id: "app-1".into(),
            actor_id: "tch-1".into(),
            detail: None,
            timestamp: Utc::now(),
        }
    }

    struct FailingTransport;

    impl NotificationTransport for FailingTransport {
        fn name(&self) -> &str {
            "failing"
        }

        fn publish(&self, _event: &DomainEvent) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("transport down".into()))
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let emitter = EventEmitter::default();
        let mut rx = emitter.subscribe();
        emitter
            .publish(vec![event("evt-1", EventType::ApplicationApproved)])
            .await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, "evt-1");
    }

    #[tokio::test]
    async fn failing_transport_does_not_block_others() {
        let emitter = EventEmitter::default();
        let recorder = Arc::new(RecordingTransport::new());
        emitter.add_transport(Arc::new(FailingTransport));
        emitter.add_transport(Arc::new(NullTransport));
        emitter.add_transport(recorder.clone());

        emitter
            .publish(vec![
                event("evt-1", EventType::ApplicationSubmitted),
                event("evt-2", EventType::ApplicationRejected),
            ])
            .await;
        assert_eq!(
            recorder.types(),
            vec![EventType::ApplicationSubmitted, EventType::ApplicationRejected]
        );
    }

    #[tokio::test]
    async fn staged_events_reach_subscribers_before_delivery() {
        let emitter = EventEmitter::default();
        let recorder = Arc::new(RecordingTransport::new());
        emitter.add_transport(recorder.clone());
        let mut rx = emitter.subscribe();

        emitter.stage(vec![event("evt-1", EventType::ApplicationSubmitted)]);
        emitter.stage(vec![event("evt-2", EventType::ApplicationCancelled)]);
        assert_eq!(rx.recv().await.unwrap().id, "evt-1");
        assert!(recorder.events().is_empty());

        emitter.deliver().await;
        assert_eq!(
            recorder.types(),
            vec![EventType::ApplicationSubmitted, EventType::ApplicationCancelled]
        );
        emitter.deliver().await;
        assert_eq!(recorder.events().len(), 2);
    }

    #[test]
    fn jsonl_transport_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let transport = JsonlTransport::new(dir.path().join("out").join("events.jsonl")).unwrap();
        transport.publish(&event("evt-1", EventType::WorkGraded)).unwrap();
        transport.publish(&event("evt-2", EventType::DeadlineClosed)).unwrap();

        let lines: Vec<DomainEvent> = serde_jsonlines::json_lines(transport.path())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].event_type, EventType::DeadlineClosed);
    }
}
