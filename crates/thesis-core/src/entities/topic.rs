use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{TopicStatus, Track};

/// A supervisor-published topic with its own sub-capacity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Topic {
    pub id: String,
    pub supervisor_id: String,
    pub semester_id: String,
    pub track: Track,
    pub title: String,
    pub description: Option<String>,
    pub max_slots: u32,
    pub taken_slots: u32,
    pub status: TopicStatus,
    /// Set when the supervisor closed the topic by hand.
    pub withdrawn: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.taken_slots >= self.max_slots
    }

    /// Status implied by the slot counts and the withdrawn flag.
    #[must_use]
    pub const fn derived_status(&self) -> TopicStatus {
        if self.withdrawn || self.is_full() {
            TopicStatus::Closed
        } else {
            TopicStatus::Open
        }
    }
}
