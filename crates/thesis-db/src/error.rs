//! Database error types for thesis-db.

use thesis_core::errors::{ErrorKind, WorkflowError};
use thiserror::Error;

/// Errors from engine operations: workflow rejections plus storage failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A workflow rule rejected the request. Nothing was written.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// A SQL query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Configuration rejected while building the service.
    #[error("Configuration error: {0}")]
    Config(#[from] thesis_config::ConfigError),

    /// Event transport or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatabaseError {
    /// The discriminant collaborators branch on.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Workflow(e) => e.kind(),
            Self::Query(_)
            | Self::Migration(_)
            | Self::NoResult
            | Self::LibSql(_)
            | Self::Config(_)
            | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// The workflow error, if this is one.
    #[must_use]
    pub const fn as_workflow(&self) -> Option<&WorkflowError> {
        match self {
            Self::Workflow(e) => Some(e),
            _ => None,
        }
    }
}
