//! Entity structs for the supervision domain.
//!
//! Each entity maps to a table in the libSQL database (see
//! `thesis-db/migrations/001_initial.sql`). All structs derive `Serialize`,
//! `Deserialize`, and `JsonSchema` for JSON roundtrip and schema validation.

mod application;
mod event;
mod grade;
mod semester;
mod topic;
mod work;

pub use application::Application;
pub use event::DomainEvent;
pub use grade::{GradeOverride, GradeRecord};
pub use semester::{Semester, TrackDeadlines};
pub use topic::Topic;
pub use work::{SubmissionRef, SupervisedWork};
