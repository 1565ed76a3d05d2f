//! Institution timezone authority.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_utc_offset() -> String {
    "+00:00".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClockConfig {
    /// Fixed offset in `+HH:MM` / `-HH:MM` form.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            utc_offset: default_utc_offset(),
        }
    }
}

impl ClockConfig {
    /// Parse `utc_offset` into a chrono offset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for anything but `±HH:MM` within ±23:59.
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "clock.utc_offset".into(),
            reason: format!("'{}': {reason}", self.utc_offset),
        };

        let s = self.utc_offset.trim();
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid("expected a leading '+' or '-'")),
        };
        let (hours, minutes) = rest
            .split_once(':')
            .ok_or_else(|| invalid("expected HH:MM"))?;
        let hours: i32 = hours.parse().map_err(|_| invalid("hours are not a number"))?;
        let minutes: i32 = minutes
            .parse()
            .map_err(|_| invalid("minutes are not a number"))?;
        if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid("out of range"));
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(|| invalid("out of range"))
    }
}
