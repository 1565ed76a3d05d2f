//! Capacity ledger arithmetic.
//!
//! One ledger exists per (supervisor, semester, track). The invariant
//! `reserved_slots + confirmed_slots <= max_slots` holds after every
//! operation; a failing operation leaves the ledger untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Track;
use crate::errors::WorkflowError;

/// Identity of a ledger. Ordered so multi-key locking can sort keys.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct LedgerKey {
    pub supervisor_id: String,
    pub semester_id: String,
    pub track: Track,
}

impl LedgerKey {
    pub fn new(supervisor_id: impl Into<String>, semester_id: impl Into<String>, track: Track) -> Self {
        Self {
            supervisor_id: supervisor_id.into(),
            semester_id: semester_id.into(),
            track,
        }
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.supervisor_id, self.semester_id, self.track)
    }
}

/// Which bucket a release returns slots from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SlotPool {
    Reserved,
    Confirmed,
}

impl SlotPool {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reserved => "reserved",
            Self::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for SlotPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot accounting record for one supervisor, semester and track.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SupervisionLedger {
    pub key: LedgerKey,
    pub max_slots: u32,
    pub reserved_slots: u32,
    pub confirmed_slots: u32,
    pub updated_at: DateTime<Utc>,
}

impl SupervisionLedger {
    #[must_use]
    pub const fn new(key: LedgerKey, max_slots: u32, now: DateTime<Utc>) -> Self {
        Self {
            key,
            max_slots,
            reserved_slots: 0,
            confirmed_slots: 0,
            updated_at: now,
        }
    }

    /// Slots neither reserved nor confirmed.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.max_slots
            .saturating_sub(self.reserved_slots)
            .saturating_sub(self.confirmed_slots)
    }

    /// Slots currently held in either bucket.
    #[must_use]
    pub const fn allocated(&self) -> u32 {
        self.reserved_slots + self.confirmed_slots
    }

    /// Provisionally hold `n` slots.
    ///
    /// # Errors
    ///
    /// `SlotUnavailable` if fewer than `n` slots remain.
    pub fn reserve(&mut self, n: u32) -> Result<(), WorkflowError> {
        Self::check_amount(n)?;
        if self.remaining() < n {
            return Err(WorkflowError::SlotUnavailable {
                key: self.key.clone(),
            });
        }
        self.reserved_slots += n;
        Ok(())
    }

    /// Move `n` reserved slots into the confirmed bucket.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if fewer than `n` slots are reserved.
    pub fn confirm(&mut self, n: u32) -> Result<(), WorkflowError> {
        Self::check_amount(n)?;
        if self.reserved_slots < n {
            return Err(WorkflowError::InvariantViolation(format!(
                "ledger {} cannot confirm {n}: only {} reserved",
                self.key, self.reserved_slots
            )));
        }
        self.reserved_slots -= n;
        self.confirmed_slots += n;
        Ok(())
    }

    /// Return `n` slots from `pool` to the remaining capacity.
    ///
    /// # Errors
    ///
    /// `InvariantViolation` if the pool holds fewer than `n` slots.
    pub fn release(&mut self, n: u32, pool: SlotPool) -> Result<(), WorkflowError> {
        Self::check_amount(n)?;
        let bucket = match pool {
            SlotPool::Reserved => &mut self.reserved_slots,
            SlotPool::Confirmed => &mut self.confirmed_slots,
        };
        if *bucket < n {
            return Err(WorkflowError::InvariantViolation(format!(
                "ledger {} cannot release {n} {pool}: only {} held",
                self.key, *bucket
            )));
        }
        *bucket -= n;
        Ok(())
    }

    /// Change the ceiling. Never below what is already allocated.
    ///
    /// # Errors
    ///
    /// `Validation` if `max_slots` is below the allocated count.
    pub fn resize(&mut self, max_slots: u32) -> Result<(), WorkflowError> {
        if max_slots < self.allocated() {
            return Err(WorkflowError::Validation(format!(
                "ledger {} already allocates {} slots, cannot shrink to {max_slots}",
                self.key,
                self.allocated()
            )));
        }
        self.max_slots = max_slots;
        Ok(())
    }

    fn check_amount(n: u32) -> Result<(), WorkflowError> {
        if n == 0 {
            return Err(WorkflowError::Validation(
                "slot amount must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
