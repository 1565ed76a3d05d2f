//! Grading and application policy knobs.

use serde::{Deserialize, Serialize};
use thesis_core::grading::{DEFAULT_PASS_MARK, GradingPolicy, MAX_SCORE, MIN_SCORE};

use crate::error::ConfigError;

const fn default_pass_mark() -> f64 {
    DEFAULT_PASS_MARK
}

const fn default_parallel_pending() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GradingConfig {
    /// Aggregate score at or above which a work passes.
    #[serde(default = "default_pass_mark")]
    pub pass_mark: f64,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            pass_mark: default_pass_mark(),
        }
    }
}

impl GradingConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the pass mark is outside the score range.
    pub fn policy(&self) -> Result<GradingPolicy, ConfigError> {
        if !(MIN_SCORE..=MAX_SCORE).contains(&self.pass_mark) {
            return Err(ConfigError::InvalidValue {
                field: "grading.pass_mark".into(),
                reason: format!("{} is outside {MIN_SCORE}..={MAX_SCORE}", self.pass_mark),
            });
        }
        Ok(GradingPolicy::new(self.pass_mark))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplicationsConfig {
    /// Allow several pending applications per student, semester and track.
    /// Approving one cancels the others. Off by default: a student holds at
    /// most one active application, and so one reservation.
    #[serde(default = "default_parallel_pending")]
    pub parallel_pending: bool,
}

impl Default for ApplicationsConfig {
    fn default() -> Self {
        Self {
            parallel_pending: default_parallel_pending(),
        }
    }
}
