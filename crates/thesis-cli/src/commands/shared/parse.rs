use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use thesis_core::clock::SemesterClock;

/// Which instant a bare date stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayEdge {
    Start,
    End,
}

/// Parse an enum value through its serde name. Accepts `pre_thesis` for
/// `pre-thesis` and the reverse.
pub fn parse_enum<T>(raw: &str, field: &str) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let attempt = |s: &str| serde_json::from_value::<T>(serde_json::Value::String(s.to_string()));
    attempt(raw)
        .or_else(|_| attempt(&raw.replace('_', "-")))
        .or_else(|_| attempt(&raw.replace('-', "_")))
        .map_err(|error| anyhow::anyhow!("invalid {field} '{raw}': {error}"))
}

/// Parse an RFC 3339 instant, or a `YYYY-MM-DD` date resolved by the
/// semester clock in the institution's offset.
pub fn parse_instant(
    raw: &str,
    clock: &SemesterClock,
    edge: DayEdge,
    field: &str,
) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(SemesterClock::normalize(&at));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!("invalid {field} '{raw}': expected RFC 3339 or YYYY-MM-DD")
    })?;
    let resolved = match edge {
        DayEdge::Start => clock.start_of_day(date),
        DayEdge::End => clock.end_of_day(date),
    };
    resolved.ok_or_else(|| anyhow::anyhow!("invalid {field} '{raw}': out of range"))
}
