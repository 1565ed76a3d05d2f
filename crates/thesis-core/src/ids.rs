//! ID prefixes for generated entity identifiers.
//!
//! IDs have the form `{prefix}-{8 hex chars}`, e.g. `app-a3f8b2c1`.

pub const PREFIX_SEMESTER: &str = "sem";
pub const PREFIX_TOPIC: &str = "top";
pub const PREFIX_APPLICATION: &str = "app";
pub const PREFIX_WORK: &str = "wrk";
pub const PREFIX_GRADE: &str = "grd";
pub const PREFIX_EVENT: &str = "evt";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_SEMESTER,
    PREFIX_TOPIC,
    PREFIX_APPLICATION,
    PREFIX_WORK,
    PREFIX_GRADE,
    PREFIX_EVENT,
];

/// Grader ID used on the synthetic record written for ungraded works.
pub const SYSTEM_GRADER: &str = "system";
