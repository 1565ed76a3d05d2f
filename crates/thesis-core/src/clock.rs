//! Semester clock.
//!
//! All deadline comparisons funnel through [`SemesterClock`]. Timestamps are
//! normalized to UTC before comparison; the institution's fixed offset is only
//! used to turn date-only deadlines into instants. Deadlines include their
//! boundary instant and exclude everything after it.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

use crate::entities::Semester;
use crate::enums::{Phase, Track};
use crate::errors::WorkflowError;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves "now" against semester deadlines.
#[derive(Clone)]
pub struct SemesterClock {
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl std::fmt::Debug for SemesterClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemesterClock")
            .field("now", &self.clock.now())
            .field("offset", &self.offset)
            .finish()
    }
}

impl SemesterClock {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { clock, offset }
    }

    /// Wall clock in UTC.
    #[must_use]
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Utc.fix())
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Convert a client-supplied timestamp to the UTC authority.
    #[must_use]
    pub fn normalize<Tz: TimeZone>(at: &DateTime<Tz>) -> DateTime<Utc> {
        at.with_timezone(&Utc)
    }

    /// First instant of `date` in the institution's offset, as UTC. `None`
    /// when the date has no representable start.
    #[must_use]
    pub fn start_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .map(|at| Self::normalize(&at))
    }

    /// Last instant of `date` in the institution's offset, as UTC. This is
    /// how a date-only deadline is read. `None` for the last representable
    /// date.
    #[must_use]
    pub fn end_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.start_of_day(date.succ_opt()?)?
            .checked_sub_signed(Duration::nanoseconds(1))
    }

    #[must_use]
    pub const fn deadline(semester: &Semester, track: Track, phase: Phase) -> DateTime<Utc> {
        semester.deadline(track, phase)
    }

    /// True while `now` has not passed the deadline. The boundary instant counts.
    #[must_use]
    pub fn is_before_deadline(&self, semester: &Semester, track: Track, phase: Phase) -> bool {
        self.now() <= semester.deadline(track, phase)
    }

    /// True while `now` is at or before the semester end and grading has not
    /// been closed administratively.
    #[must_use]
    pub fn can_grade(&self, semester: &Semester) -> bool {
        semester.grading_closed_at.is_none() && self.now() <= semester.ends_at
    }

    /// # Errors
    ///
    /// `DeadlineExceeded` once the deadline has passed.
    pub fn ensure_before_deadline(
        &self,
        semester: &Semester,
        track: Track,
        phase: Phase,
    ) -> Result<(), WorkflowError> {
        if self.is_before_deadline(semester, track, phase) {
            Ok(())
        } else {
            Err(WorkflowError::DeadlineExceeded { track, phase })
        }
    }

    /// # Errors
    ///
    /// `GradingClosed` once grading is no longer possible.
    pub fn ensure_can_grade(&self, semester: &Semester) -> Result<(), WorkflowError> {
        if self.can_grade(semester) {
            Ok(())
        } else {
            Err(WorkflowError::GradingClosed {
                semester_id: semester.id.clone(),
            })
        }
    }
}
