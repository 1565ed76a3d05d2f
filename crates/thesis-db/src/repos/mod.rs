//! Workflow operations, one module per component.
//!
//! Each module holds the row mapping for its table, the free functions other
//! modules call inside an open transaction, and an `impl ThesisService` block
//! with the public operations.

mod application;
mod assignment;
mod event_log;
mod grading;
mod ledger;
mod semester;
mod topic;

pub use application::{Approval, NewApplication};
pub use assignment::NewAssignment;
pub use event_log::EventFilter;
pub use grading::GradingReport;
pub use semester::NewSemester;
pub use topic::NewTopic;
