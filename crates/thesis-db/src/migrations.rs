//! Database migration runner.
//!
//! Embeds the SQL migration files at compile time and executes them on
//! database open. All statements use `IF NOT EXISTS` for idempotent re-running.

use crate::ThesisDb;
use crate::error::DatabaseError;

/// Initial schema: 8 tables, ledger/topic/grade CHECK constraints, indexes.
const MIGRATION_001: &str = include_str!("../migrations/001_initial.sql");

impl ThesisDb {
    /// Run all embedded migrations in sequence.
    pub(crate) async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().await;
        conn.execute_batch(MIGRATION_001)
            .await
            .map_err(|e| DatabaseError::Migration(format!("001_initial: {e}")))?;
        Ok(())
    }
}
