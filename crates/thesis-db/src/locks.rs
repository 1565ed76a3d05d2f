//! Per-key async locks.
//!
//! Workflow operations serialize on logical keys rather than on the whole
//! engine: two students applying to different supervisors never wait for each
//! other beyond the short gated write.
//!
//! # Lock ordering
//!
//! Keys are totally ordered: every `Student` key sorts before every `Ledger`
//! key, which sorts before every `Work` key. [`KeyedLocks::lock_all`] sorts and
//! de-duplicates before acquiring, and callers take all keys of an operation in
//! one call, so no two operations can wait on each other in a cycle.
//!
//! An operation that only learns some keys after taking others (approval
//! reads the student's other pending applications under the student lock)
//! must take the later keys in a second call whose keys all sort after the
//! ones it already holds.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use thesis_core::enums::Track;
use thesis_core::ledger::LedgerKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idle entries are swept once the table grows past this size.
const SWEEP_THRESHOLD: usize = 1024;

/// A logical resource guarded by [`KeyedLocks`]. Variant order is lock order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    /// A student's active work within one semester and track.
    Student {
        student_id: String,
        semester_id: String,
        track: Track,
    },
    /// A supervisor's capacity ledger.
    Ledger(LedgerKey),
    /// Grading state of one work.
    Work(String),
}

impl LockKey {
    pub fn student(student_id: &str, semester_id: &str, track: Track) -> Self {
        Self::Student {
            student_id: student_id.to_string(),
            semester_id: semester_id.to_string(),
            track,
        }
    }
}

/// Guards held for the duration of one operation. Released on drop.
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct KeyGuards {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl KeyGuards {
    /// For operations that touch no keyed resource.
    pub const fn none() -> Self {
        Self {
            _guards: Vec::new(),
        }
    }

    /// Hold both sets until the result is dropped.
    pub fn merge(mut self, mut other: Self) -> Self {
        self._guards.append(&mut other._guards);
        self
    }
}

/// Table of async mutexes, one per live key.
#[derive(Default)]
pub struct KeyedLocks {
    table: StdMutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a single key.
    pub async fn lock(&self, key: LockKey) -> KeyGuards {
        self.lock_all([key]).await
    }

    /// Acquire every key in lock order.
    pub async fn lock_all(&self, keys: impl IntoIterator<Item = LockKey>) -> KeyGuards {
        let ordered: BTreeSet<LockKey> = keys.into_iter().collect();
        let mutexes: Vec<Arc<Mutex<()>>> = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            if table.len() > SWEEP_THRESHOLD {
                table.retain(|_, m| Arc::strong_count(m) > 1);
            }
            ordered
                .iter()
                .map(|key| Arc::clone(table.entry(key.clone()).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        KeyGuards { _guards: guards }
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self, key: &LockKey) -> bool {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|mutex| mutex.try_lock().is_err())
    }
}
