//! Status enums, tracks, roles, and event types for the supervision engine.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`,
//! except where the wire name needs a hyphen (`pre-thesis`, `graded-approved`).
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the workflow layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Track
// ---------------------------------------------------------------------------

/// Supervision track. Each track has independent capacity and deadlines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum Track {
    PreThesis,
    Thesis,
}

impl Track {
    pub const ALL: [Self; 2] = [Self::PreThesis, Self::Thesis];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreThesis => "pre-thesis",
            Self::Thesis => "thesis",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Deadline phase within a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Registration,
    Submission,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Submission => "submission",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TopicStatus
// ---------------------------------------------------------------------------

/// Whether a topic accepts new applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Open,
    Closed,
}

impl TopicStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApplicationStatus
// ---------------------------------------------------------------------------

/// Status of a student application to a topic.
///
/// ```text
/// pending → approved
///         → rejected
///         → cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Approved, Self::Rejected, Self::Cancelled],
            Self::Approved | Self::Rejected | Self::Cancelled => &[],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Pending and approved applications count against the one-active rule.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkStatus
// ---------------------------------------------------------------------------

/// Status of a supervised work (pre-thesis or thesis).
///
/// ```text
/// active → submitted → graded_approved
///                    → graded_failed
///        → graded_approved
///        → graded_failed
/// submitted → submitted (re-submission)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum WorkStatus {
    Active,
    Submitted,
    GradedApproved,
    GradedFailed,
}

impl WorkStatus {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Submitted, Self::GradedApproved, Self::GradedFailed],
            Self::Submitted => &[Self::Submitted, Self::GradedApproved, Self::GradedFailed],
            Self::GradedApproved | Self::GradedFailed => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether grading has finalized this work.
    #[must_use]
    pub const fn is_graded(self) -> bool {
        matches!(self, Self::GradedApproved | Self::GradedFailed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Submitted => "submitted",
            Self::GradedApproved => "graded-approved",
            Self::GradedFailed => "graded-failed",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// GraderRole
// ---------------------------------------------------------------------------

/// Role under which a grade is recorded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum GraderRole {
    Supervisor,
    Reviewer,
    Committee,
}

impl GraderRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Reviewer => "reviewer",
            Self::Committee => "committee",
        }
    }
}

impl fmt::Display for GraderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Account role supplied by the authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Moderator,
    Teacher,
    Student,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EntityType
// ---------------------------------------------------------------------------

/// Type of entity in the system, used as the subject of domain events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Semester,
    Ledger,
    Topic,
    Application,
    Work,
    Grade,
}

impl EntityType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semester => "semester",
            Self::Ledger => "ledger",
            Self::Topic => "topic",
            Self::Application => "application",
            Self::Work => "work",
            Self::Grade => "grade",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Kind of domain event raised by a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SemesterCreated,
    SemesterRescheduled,
    DeadlineCorrected,
    LedgerProvisioned,
    LedgerDeleted,
    TopicPublished,
    TopicWithdrawn,
    ApplicationSubmitted,
    ApplicationApproved,
    ApplicationRejected,
    ApplicationCancelled,
    WorkAssigned,
    WorkUnassigned,
    ReviewerAssigned,
    WorkSubmitted,
    GradeSubmitted,
    GradeOverridden,
    WorkGraded,
    DeadlineClosed,
}

impl EventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SemesterCreated => "semester_created",
            Self::SemesterRescheduled => "semester_rescheduled",
            Self::DeadlineCorrected => "deadline_corrected",
            Self::LedgerProvisioned => "ledger_provisioned",
            Self::LedgerDeleted => "ledger_deleted",
            Self::TopicPublished => "topic_published",
            Self::TopicWithdrawn => "topic_withdrawn",
            Self::ApplicationSubmitted => "application_submitted",
            Self::ApplicationApproved => "application_approved",
            Self::ApplicationRejected => "application_rejected",
            Self::ApplicationCancelled => "application_cancelled",
            Self::WorkAssigned => "work_assigned",
            Self::WorkUnassigned => "work_unassigned",
            Self::ReviewerAssigned => "reviewer_assigned",
            Self::WorkSubmitted => "work_submitted",
            Self::GradeSubmitted => "grade_submitted",
            Self::GradeOverridden => "grade_overridden",
            Self::WorkGraded => "work_graded",
            Self::DeadlineClosed => "deadline_closed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_terminal_states_have_no_exits() {
        for status in [
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
            ApplicationStatus::Cancelled,
        ] {
            assert!(status.allowed_next_states().is_empty(), "{status}");
        }
        assert!(ApplicationStatus::Pending.can_transition_to(ApplicationStatus::Approved));
        assert!(!ApplicationStatus::Rejected.can_transition_to(ApplicationStatus::Pending));
    }

    #[test]
    fn graded_work_is_terminal() {
        assert!(WorkStatus::GradedApproved.is_graded());
        assert!(WorkStatus::GradedFailed.allowed_next_states().is_empty());
        assert!(WorkStatus::Submitted.can_transition_to(WorkStatus::Submitted));
        assert!(!WorkStatus::Submitted.can_transition_to(WorkStatus::Active));
    }

    #[test]
    fn serde_names_match_as_str() {
        for track in Track::ALL {
            let json = serde_json::to_value(track).unwrap();
            assert_eq!(json, serde_json::Value::String(track.as_str().into()));
        }
        for status in [
            WorkStatus::Active,
            WorkStatus::Submitted,
            WorkStatus::GradedApproved,
            WorkStatus::GradedFailed,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().into()));
        }
        let json = serde_json::to_value(EventType::DeadlineClosed).unwrap();
        assert_eq!(json, "deadline_closed");
    }
}
