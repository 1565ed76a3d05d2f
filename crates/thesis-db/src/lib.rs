//! # thesis-db
//!
//! libSQL-backed workflow engine for thesis and pre-thesis supervision.
//!
//! Holds the capacity ledger, topic catalog, application and assignment
//! workflows, grading aggregator and event emitter. Every mutating operation
//! runs as one SQL transaction behind per-key locks (see [`locks`]) and emits
//! domain events after commit (see [`events`]).
//!
//! A single libSQL connection is shared behind an async gate: a write
//! transaction holds the gate from `BEGIN` to `COMMIT`, so no other task can
//! interleave statements with it or read its uncommitted rows.

pub mod error;
pub mod events;
pub mod helpers;
pub mod locks;
mod migrations;
pub mod repos;
pub mod service;

#[cfg(test)]
mod test_support;

use std::ops::Deref;

use error::DatabaseError;
use libsql::Builder;
use tokio::sync::{Mutex, MutexGuard};

/// Central database handle.
pub struct ThesisDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: Mutex<libsql::Connection>,
}

impl ThesisDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let thesis_db = Self {
            db,
            conn: Mutex::new(conn),
        };
        thesis_db.run_migrations().await?;
        Ok(thesis_db)
    }

    /// Borrow the connection for reads. Holds the gate until dropped, so keep
    /// the guard scoped to the query.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if an abandoned transaction cannot be rolled
    /// back.
    pub async fn read(&self) -> Result<MutexGuard<'_, libsql::Connection>, DatabaseError> {
        self.gate().await
    }

    /// Start an immediate write transaction.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if `BEGIN` fails.
    pub async fn begin(&self) -> Result<WriteTx<'_>, DatabaseError> {
        let conn = self.gate().await?;
        conn.execute("BEGIN IMMEDIATE", ()).await?;
        Ok(WriteTx {
            conn,
            finished: false,
        })
    }

    /// Take the connection, discarding any transaction a dropped `WriteTx`
    /// left open.
    async fn gate(&self) -> Result<MutexGuard<'_, libsql::Connection>, DatabaseError> {
        let conn = self.conn.lock().await;
        if !conn.is_autocommit() {
            tracing::warn!("rolling back an abandoned transaction");
            conn.execute("ROLLBACK", ()).await?;
        }
        Ok(conn)
    }
}

/// An open write transaction. Derefs to the connection.
///
/// Finish with [`WriteTx::finish`], which commits on `Ok` and rolls back on
/// `Err`, so a failed operation never leaves partial state behind.
pub struct WriteTx<'a> {
    conn: MutexGuard<'a, libsql::Connection>,
    finished: bool,
}

impl Deref for WriteTx<'_> {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl WriteTx<'_> {
    /// # Errors
    ///
    /// Returns `DatabaseError` if `COMMIT` fails.
    pub async fn commit(mut self) -> Result<(), DatabaseError> {
        self.conn.execute("COMMIT", ()).await?;
        self.finished = true;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if `ROLLBACK` fails.
    pub async fn rollback(mut self) -> Result<(), DatabaseError> {
        self.conn.execute("ROLLBACK", ()).await?;
        self.finished = true;
        Ok(())
    }

    /// Commit `result`'s writes if it is `Ok`, roll them back otherwise.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or the commit failure.
    pub async fn finish<T>(self, result: Result<T, DatabaseError>) -> Result<T, DatabaseError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::error!(%rollback_err, "rollback failed after: {err}");
                }
                Err(err)
            }
        }
    }
}

impl Drop for WriteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("write transaction dropped without commit; it is rolled back on next use");
        }
    }
}
