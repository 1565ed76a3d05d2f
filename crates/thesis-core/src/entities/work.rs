use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{Track, WorkStatus};
use crate::ledger::LedgerKey;

/// A pre-thesis or thesis under active supervision.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SupervisedWork {
    pub id: String,
    pub student_id: String,
    pub supervisor_id: String,
    pub reviewer_id: Option<String>,
    pub semester_id: String,
    pub track: Track,
    /// Absent for direct thesis assignments.
    pub topic_id: Option<String>,
    pub application_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkStatus,
    pub submission_deadline: DateTime<Utc>,
    pub grade_override: Option<f64>,
    pub final_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl SupervisedWork {
    /// Ledger holding this work's confirmed slot.
    #[must_use]
    pub fn ledger_key(&self) -> LedgerKey {
        LedgerKey::new(&self.supervisor_id, &self.semester_id, self.track)
    }
}

/// Opaque file-store reference attached to a work submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SubmissionRef {
    pub work_id: String,
    pub file_ref: String,
    pub submitted_at: DateTime<Utc>,
}
