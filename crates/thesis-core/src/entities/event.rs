use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{EntityType, EventType};

/// A domain event handed to the notification layer.
///
/// Serialized shape: `{id, type, subject_type, subject_id, actor_id, detail, timestamp}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DomainEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub subject_type: EntityType,
    pub subject_id: String,
    pub actor_id: String,
    pub detail: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}
