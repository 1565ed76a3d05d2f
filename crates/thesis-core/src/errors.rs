//! Workflow error taxonomy.
//!
//! Every engine operation returns these as values; nothing is thrown across a
//! transaction boundary. Storage errors live in `thesis-db` and wrap this type.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{EntityType, Phase, Track};
use crate::ledger::LedgerKey;

/// Stable discriminant handed to collaborators alongside an operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SlotUnavailable,
    DuplicateApplication,
    TopicClosed,
    DeadlineExceeded,
    InvariantViolation,
    NotFound,
    Unauthorized,
    InvalidTransition,
    SemesterFrozen,
    GradingWindowOpen,
    Validation,
    Storage,
}

/// Errors raised by workflow operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// The supervisor's ledger has no remaining capacity.
    #[error("No slots left on ledger {key}")]
    SlotUnavailable { key: LedgerKey },

    #[error("Student {student_id} already has an active {track} application this semester")]
    DuplicateApplication { student_id: String, track: Track },

    #[error("Topic {topic_id} is closed")]
    TopicClosed { topic_id: String },

    #[error("The {track} {phase} deadline has passed")]
    DeadlineExceeded { track: Track, phase: Phase },

    /// Grading window for the semester is closed.
    #[error("Grading for semester {semester_id} is closed")]
    GradingClosed { semester_id: String },

    /// Ledger arithmetic inconsistency. Always a defect.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("Actor {actor_id} is not allowed to {action}")]
    Unauthorized { actor_id: String, action: String },

    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: EntityType,
        id: String,
        from: String,
        to: String,
    },

    /// Semester dates cannot change once work references the semester.
    #[error("Semester {semester_id} is frozen")]
    SemesterFrozen { semester_id: String },

    /// Closing a grading window that is still open.
    #[error("Grading for semester {semester_id} is still open")]
    GradingWindowOpen { semester_id: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl WorkflowError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SlotUnavailable { .. } => ErrorKind::SlotUnavailable,
            Self::DuplicateApplication { .. } => ErrorKind::DuplicateApplication,
            Self::TopicClosed { .. } => ErrorKind::TopicClosed,
            Self::DeadlineExceeded { .. } | Self::GradingClosed { .. } => {
                ErrorKind::DeadlineExceeded
            }
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::SemesterFrozen { .. } => ErrorKind::SemesterFrozen,
            Self::GradingWindowOpen { .. } => ErrorKind::GradingWindowOpen,
            Self::Validation(_) => ErrorKind::Validation,
        }
    }

    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity_type: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn unauthorized(actor_id: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Unauthorized {
            actor_id: actor_id.into(),
            action: action.into(),
        }
    }

    pub fn invalid_transition(
        entity_type: EntityType,
        id: impl Into<String>,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity_type,
            id: id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
