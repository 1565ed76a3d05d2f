use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::GraderRole;

/// One grader's score for a work. At most one per (work, grader, role).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GradeRecord {
    pub id: String,
    pub work_id: String,
    pub grader_id: String,
    pub role: GraderRole,
    pub score: f64,
    pub feedback: Option<String>,
    /// True for the record written when a work closes with no grades.
    pub synthetic: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Administrative score that replaces the arithmetic mean.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GradeOverride {
    pub score: f64,
    pub reason: String,
}
