//! Grade aggregation policy.
//!
//! The aggregate is the stored override when present, otherwise the mean of
//! every recorded score. A work passes when the aggregate reaches the pass
//! mark; the boundary passes.

use crate::entities::GradeRecord;
use crate::enums::WorkStatus;
use crate::errors::WorkflowError;

pub const DEFAULT_PASS_MARK: f64 = 50.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// Feedback text on the record written for works that close ungraded.
pub const NO_SUBMISSION_FEEDBACK: &str = "no submission";

/// Reject scores outside `[0, 100]` and non-finite values.
///
/// # Errors
///
/// `Validation` when the score is out of range.
pub fn validate_score(score: f64) -> Result<(), WorkflowError> {
    if score.is_finite() && (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(WorkflowError::Validation(format!(
            "score {score} must be between {MIN_SCORE} and {MAX_SCORE}"
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradingPolicy {
    pub pass_mark: f64,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            pass_mark: DEFAULT_PASS_MARK,
        }
    }
}

impl GradingPolicy {
    #[must_use]
    pub const fn new(pass_mark: f64) -> Self {
        Self { pass_mark }
    }

    /// Current aggregate, or `None` when nothing has been graded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aggregate(records: &[GradeRecord], override_score: Option<f64>) -> Option<f64> {
        if let Some(score) = override_score {
            return Some(score);
        }
        if records.is_empty() {
            return None;
        }
        let sum: f64 = records.iter().map(|r| r.score).sum();
        Some(sum / records.len() as f64)
    }

    /// Terminal status for an aggregate score.
    #[must_use]
    pub fn outcome(&self, aggregate: f64) -> WorkStatus {
        if aggregate >= self.pass_mark {
            WorkStatus::GradedApproved
        } else {
            WorkStatus::GradedFailed
        }
    }
}
