//! Event bus and transport settings.

use serde::{Deserialize, Serialize};

const fn default_channel_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    /// Broadcast buffer before slow subscribers start lagging.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Append every event to this JSON-lines file when set.
    #[serde(default)]
    pub jsonl_path: Option<String>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            jsonl_path: None,
        }
    }
}

impl EventsConfig {
    #[must_use]
    pub const fn has_jsonl_transport(&self) -> bool {
        self.jsonl_path.is_some()
    }
}
