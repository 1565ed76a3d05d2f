//! Service layer orchestrating workflow mutations with locks, transactions
//! and events.
//!
//! `ThesisService` wraps `ThesisDb` (raw database access), the semester clock,
//! the grading policy and the event emitter. All workflow operations are
//! implemented as `impl ThesisService` blocks under [`crate::repos`].
//!
//! Every mutation follows this protocol:
//! 1. Acquire the operation's per-key locks, in one call
//! 2. Begin an immediate transaction
//! 3. Read, validate, write, and record events in the outbox
//! 4. Commit on success, roll back on any error
//! 5. Stage the outbox on the bus, release the locks, then deliver to
//!    transports

use std::sync::Arc;

use thesis_config::ThesisConfig;
use thesis_core::clock::SemesterClock;
use thesis_core::entities::DomainEvent;
use thesis_core::errors::ErrorKind;
use thesis_core::grading::GradingPolicy;
use tokio::sync::broadcast;

use crate::error::DatabaseError;
use crate::events::{EventEmitter, JsonlTransport, NotificationTransport, Outbox};
use crate::locks::{KeyGuards, KeyedLocks};
use crate::{ThesisDb, WriteTx};

/// Whether a student may hold several pending applications per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPolicy {
    /// Many pending; approving one auto-cancels the rest.
    Parallel,
    /// At most one pending or approved application per semester and track.
    Exclusive,
}

/// Workflow engine entry point.
pub struct ThesisService {
    db: ThesisDb,
    clock: SemesterClock,
    policy: GradingPolicy,
    pending: PendingPolicy,
    locks: KeyedLocks,
    emitter: EventEmitter,
}

impl ThesisService {
    /// Create a service over a local database with default policies.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the libSQL database file, or `":memory:"` for tests.
    /// * `clock` - The authority for every deadline comparison.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str, clock: SemesterClock) -> Result<Self, DatabaseError> {
        let db = ThesisDb::open_local(db_path).await?;
        Ok(Self::from_db(db, clock))
    }

    /// Build a service from loaded configuration.
    ///
    /// Creates the database's parent directory and registers the JSONL
    /// transport when `events.jsonl_path` is set.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a config value is invalid, the database
    /// cannot be opened, or the JSONL path cannot be prepared.
    pub async fn from_config(config: &ThesisConfig) -> Result<Self, DatabaseError> {
        let offset = config.clock.offset()?;
        let policy = config.grading.policy()?;

        if !config.database.is_in_memory() {
            if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let clock = SemesterClock::new(Arc::new(thesis_core::clock::SystemClock), offset);
        let db = ThesisDb::open_local(&config.database.path).await?;
        let mut service = Self::from_db(db, clock)
            .with_policy(policy)
            .with_emitter(EventEmitter::with_capacity(config.events.channel_capacity));
        service.pending = if config.applications.parallel_pending {
            PendingPolicy::Parallel
        } else {
            PendingPolicy::Exclusive
        };
        if let Some(path) = &config.events.jsonl_path {
            service.add_transport(Arc::new(JsonlTransport::new(path)?));
        }
        tracing::debug!(path = %config.database.path, pending = ?service.pending, "service ready");
        Ok(service)
    }

    /// Create from an existing `ThesisDb` (for testing).
    #[must_use]
    pub fn from_db(db: ThesisDb, clock: SemesterClock) -> Self {
        Self {
            db,
            clock,
            policy: GradingPolicy::default(),
            pending: PendingPolicy::Exclusive,
            locks: KeyedLocks::new(),
            emitter: EventEmitter::default(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: GradingPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_pending_policy(mut self, pending: PendingPolicy) -> Self {
        self.pending = pending;
        self
    }

    #[must_use]
    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    /// Register a notification transport. Applies to events committed after
    /// this call.
    pub fn add_transport(&self, transport: Arc<dyn NotificationTransport>) {
        self.emitter.add_transport(transport);
    }

    /// Subscribe to committed events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.emitter.subscribe()
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &ThesisDb {
        &self.db
    }

    #[must_use]
    pub const fn clock(&self) -> &SemesterClock {
        &self.clock
    }

    #[must_use]
    pub const fn policy(&self) -> &GradingPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn pending_policy(&self) -> PendingPolicy {
        self.pending
    }

    pub(crate) const fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Finish `tx` with `result`. On commit the outbox is staged while
    /// `guards` are still held, then the guards are released before the
    /// transports run. On any error the events are dropped with the
    /// rolled-back writes.
    pub(crate) async fn complete<T>(
        &self,
        operation: &'static str,
        guards: KeyGuards,
        tx: WriteTx<'_>,
        outbox: Outbox,
        result: Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let finished = tx.finish(result).await;
        if finished.is_ok() {
            self.emitter.stage(outbox.into_events());
        }
        drop(guards);
        match finished {
            Ok(value) => {
                self.emitter.deliver().await;
                Ok(value)
            }
            Err(error) => {
                log_failure(operation, &error);
                Err(error)
            }
        }
    }
}

fn log_failure(operation: &'static str, error: &DatabaseError) {
    match error.kind() {
        ErrorKind::InvariantViolation | ErrorKind::Storage => {
            tracing::error!(operation, %error, "operation failed");
        }
        ErrorKind::Unauthorized | ErrorKind::InvalidTransition | ErrorKind::Validation => {
            tracing::warn!(operation, %error, "request rejected");
        }
        _ => tracing::debug!(operation, %error, "request refused"),
    }
}
