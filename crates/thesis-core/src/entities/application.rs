use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ApplicationStatus, Track};

/// A student's application to a topic.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Application {
    pub id: String,
    pub student_id: String,
    pub topic_id: String,
    pub supervisor_id: String,
    pub semester_id: String,
    pub track: Track,
    pub title: String,
    pub description: Option<String>,
    pub status: ApplicationStatus,
    pub decision_reason: Option<String>,
    /// Work created when the application was approved.
    pub work_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
