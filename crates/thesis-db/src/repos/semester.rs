//! Semester repository: the authoritative deadline record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thesis_core::entities::{Semester, TrackDeadlines};
use thesis_core::enums::{EntityType, EventType, Phase, Track};
use thesis_core::errors::WorkflowError;
use thesis_core::identity::{Administrator, Capability};
use thesis_core::ids::PREFIX_SEMESTER;

use crate::error::DatabaseError;
use crate::events::{EventDraft, Outbox};
use crate::helpers::{
    fmt_datetime, generate_id, parse_datetime, parse_optional_datetime, query_all, query_count,
    query_opt,
};
use crate::locks::KeyGuards;
use crate::service::ThesisService;

const SELECT_COLS: &str = "id, name, starts_at, ends_at, \
     pre_thesis_registration_deadline, pre_thesis_submission_deadline, \
     thesis_registration_deadline, thesis_submission_deadline, \
     grading_closed_at, created_at, updated_at";

fn row_to_semester(row: &libsql::Row) -> Result<Semester, DatabaseError> {
    Ok(Semester {
        id: row.get(0)?,
        name: row.get(1)?,
        starts_at: parse_datetime(&row.get::<String>(2)?)?,
        ends_at: parse_datetime(&row.get::<String>(3)?)?,
        pre_thesis: TrackDeadlines {
            registration: parse_datetime(&row.get::<String>(4)?)?,
            submission: parse_datetime(&row.get::<String>(5)?)?,
        },
        thesis: TrackDeadlines {
            registration: parse_datetime(&row.get::<String>(6)?)?,
            submission: parse_datetime(&row.get::<String>(7)?)?,
        },
        grading_closed_at: parse_optional_datetime(row.get::<Option<String>>(8)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(9)?)?,
        updated_at: parse_datetime(&row.get::<String>(10)?)?,
    })
}

const fn deadline_column(track: Track, phase: Phase) -> &'static str {
    match (track, phase) {
        (Track::PreThesis, Phase::Registration) => "pre_thesis_registration_deadline",
        (Track::PreThesis, Phase::Submission) => "pre_thesis_submission_deadline",
        (Track::Thesis, Phase::Registration) => "thesis_registration_deadline",
        (Track::Thesis, Phase::Submission) => "thesis_submission_deadline",
    }
}

/// Dates of a semester as supplied by administration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSemester {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub pre_thesis: TrackDeadlines,
    pub thesis: TrackDeadlines,
}

impl NewSemester {
    fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.trim().is_empty() {
            return Err(WorkflowError::Validation("semester name is empty".into()));
        }
        if self.starts_at >= self.ends_at {
            return Err(WorkflowError::Validation(format!(
                "semester starts at {} but ends at {}",
                self.starts_at, self.ends_at
            )));
        }
        let window = (self.starts_at, self.ends_at);
        check_deadlines(Track::PreThesis, &self.pre_thesis, window)?;
        check_deadlines(Track::Thesis, &self.thesis, window)
    }
}

/// Registration precedes submission and both fall inside the semester, so
/// every submitted work can still be graded.
fn check_deadlines(
    track: Track,
    deadlines: &TrackDeadlines,
    (starts_at, ends_at): (DateTime<Utc>, DateTime<Utc>),
) -> Result<(), WorkflowError> {
    if deadlines.registration > deadlines.submission {
        return Err(WorkflowError::Validation(format!(
            "{track} registration deadline {} is after its submission deadline {}",
            deadlines.registration, deadlines.submission
        )));
    }
    for (phase, at) in [
        (Phase::Registration, deadlines.registration),
        (Phase::Submission, deadlines.submission),
    ] {
        if at < starts_at || at > ends_at {
            return Err(WorkflowError::Validation(format!(
                "{track} {phase} deadline {at} is outside the semester {starts_at} to {ends_at}"
            )));
        }
    }
    Ok(())
}

/// Load a semester inside the caller's transaction.
pub(crate) async fn load_semester(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Semester, DatabaseError> {
    query_opt(
        conn,
        &format!("SELECT {SELECT_COLS} FROM semesters WHERE id = ?1"),
        [id],
        row_to_semester,
    )
    .await?
    .ok_or_else(|| WorkflowError::not_found(EntityType::Semester, id).into())
}

/// Stamp the semester's grading window as closed.
pub(crate) async fn mark_grading_closed(
    conn: &libsql::Connection,
    semester_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE semesters SET grading_closed_at = ?1, updated_at = ?1 WHERE id = ?2",
        libsql::params![fmt_datetime(&now), semester_id],
    )
    .await?;
    Ok(())
}

/// True once any application or work references the semester.
async fn is_referenced(conn: &libsql::Connection, id: &str) -> Result<bool, DatabaseError> {
    let count = query_count(
        conn,
        "SELECT (SELECT COUNT(*) FROM applications WHERE semester_id = ?1)
              + (SELECT COUNT(*) FROM works WHERE semester_id = ?1)",
        [id],
    )
    .await?;
    Ok(count > 0)
}

impl ThesisService {
    /// # Errors
    ///
    /// `Validation` if the dates are inconsistent.
    pub async fn create_semester(
        &self,
        admin: &Administrator,
        new: NewSemester,
    ) -> Result<Semester, DatabaseError> {
        new.validate()?;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self.create_semester_in_tx(&tx, &mut outbox, admin, new).await;
        let semester = self
            .complete("create_semester", KeyGuards::none(), tx, outbox, result)
            .await?;
        tracing::info!(semester_id = %semester.id, name = %semester.name, "semester created");
        Ok(semester)
    }

    async fn create_semester_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        new: NewSemester,
    ) -> Result<Semester, DatabaseError> {
        let now = self.clock().now();
        let id = generate_id(conn, PREFIX_SEMESTER).await?;
        conn.execute(
            &format!(
                "INSERT INTO semesters ({SELECT_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?9)"
            ),
            libsql::params![
                id.as_str(),
                new.name.as_str(),
                fmt_datetime(&new.starts_at),
                fmt_datetime(&new.ends_at),
                fmt_datetime(&new.pre_thesis.registration),
                fmt_datetime(&new.pre_thesis.submission),
                fmt_datetime(&new.thesis.registration),
                fmt_datetime(&new.thesis.submission),
                fmt_datetime(&now)
            ],
        )
        .await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::SemesterCreated,
                    subject_type: EntityType::Semester,
                    subject_id: &id,
                    actor_id: admin.actor_id(),
                    detail: Some(serde_json::json!({ "name": new.name })),
                },
                now,
            )
            .await?;

        Ok(Semester {
            id,
            name: new.name,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            pre_thesis: new.pre_thesis,
            thesis: new.thesis,
            grading_closed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// # Errors
    ///
    /// `NotFound` if no semester has this id.
    pub async fn get_semester(&self, id: &str) -> Result<Semester, DatabaseError> {
        let conn = self.db().read().await?;
        load_semester(&conn, id).await
    }

    /// All semesters, most recent start first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_semesters(&self) -> Result<Vec<Semester>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!("SELECT {SELECT_COLS} FROM semesters ORDER BY starts_at DESC, id"),
            (),
            row_to_semester,
        )
        .await
    }

    /// Administrative deadline correction. Permitted even on a frozen
    /// semester. Works of the track pick up a corrected submission deadline.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown semester, `Validation` if the correction puts
    /// registration after submission.
    pub async fn correct_deadline(
        &self,
        admin: &Administrator,
        semester_id: &str,
        track: Track,
        phase: Phase,
        deadline: DateTime<Utc>,
    ) -> Result<Semester, DatabaseError> {
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .correct_deadline_in_tx(&tx, &mut outbox, admin, semester_id, track, phase, deadline)
            .await;
        let semester = self
            .complete("correct_deadline", KeyGuards::none(), tx, outbox, result)
            .await?;
        tracing::info!(%semester_id, %track, %phase, %deadline, "deadline corrected");
        Ok(semester)
    }

    #[allow(clippy::too_many_arguments)]
    async fn correct_deadline_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        semester_id: &str,
        track: Track,
        phase: Phase,
        deadline: DateTime<Utc>,
    ) -> Result<Semester, DatabaseError> {
        let now = self.clock().now();
        let mut semester = load_semester(conn, semester_id).await?;
        let previous = semester.deadline(track, phase);
        semester.deadlines_mut(track).set(phase, deadline);
        check_deadlines(
            track,
            semester.deadlines(track),
            (semester.starts_at, semester.ends_at),
        )?;
        semester.updated_at = now;

        conn.execute(
            &format!(
                "UPDATE semesters SET {} = ?1, updated_at = ?2 WHERE id = ?3",
                deadline_column(track, phase)
            ),
            libsql::params![fmt_datetime(&deadline), fmt_datetime(&now), semester_id],
        )
        .await?;

        if phase == Phase::Submission {
            conn.execute(
                "UPDATE works SET submission_deadline = ?1, updated_at = ?2
                 WHERE semester_id = ?3 AND track = ?4 AND status IN ('active', 'submitted')",
                libsql::params![
                    fmt_datetime(&deadline),
                    fmt_datetime(&now),
                    semester_id,
                    track.as_str()
                ],
            )
            .await?;
        }

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::DeadlineCorrected,
                    subject_type: EntityType::Semester,
                    subject_id: semester_id,
                    actor_id: admin.actor_id(),
                    detail: Some(serde_json::json!({
                        "track": track,
                        "phase": phase,
                        "previous": previous,
                        "deadline": deadline,
                    })),
                },
                now,
            )
            .await?;
        Ok(semester)
    }

    /// Replace every date and the name of a semester nothing references yet.
    ///
    /// # Errors
    ///
    /// `SemesterFrozen` once an application or work references the semester,
    /// `Validation` for inconsistent dates.
    pub async fn reschedule_semester(
        &self,
        admin: &Administrator,
        semester_id: &str,
        schedule: NewSemester,
    ) -> Result<Semester, DatabaseError> {
        schedule.validate()?;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .reschedule_in_tx(&tx, &mut outbox, admin, semester_id, schedule)
            .await;
        let semester = self
            .complete("reschedule_semester", KeyGuards::none(), tx, outbox, result)
            .await?;
        tracing::info!(%semester_id, "semester rescheduled");
        Ok(semester)
    }

    async fn reschedule_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        semester_id: &str,
        schedule: NewSemester,
    ) -> Result<Semester, DatabaseError> {
        let now = self.clock().now();
        let current = load_semester(conn, semester_id).await?;
        if is_referenced(conn, semester_id).await? {
            return Err(WorkflowError::SemesterFrozen {
                semester_id: semester_id.to_string(),
            }
            .into());
        }

        conn.execute(
            "UPDATE semesters SET name = ?1, starts_at = ?2, ends_at = ?3,
                pre_thesis_registration_deadline = ?4, pre_thesis_submission_deadline = ?5,
                thesis_registration_deadline = ?6, thesis_submission_deadline = ?7,
                updated_at = ?8
             WHERE id = ?9",
            libsql::params![
                schedule.name.as_str(),
                fmt_datetime(&schedule.starts_at),
                fmt_datetime(&schedule.ends_at),
                fmt_datetime(&schedule.pre_thesis.registration),
                fmt_datetime(&schedule.pre_thesis.submission),
                fmt_datetime(&schedule.thesis.registration),
                fmt_datetime(&schedule.thesis.submission),
                fmt_datetime(&now),
                semester_id
            ],
        )
        .await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::SemesterRescheduled,
                    subject_type: EntityType::Semester,
                    subject_id: semester_id,
                    actor_id: admin.actor_id(),
                    detail: None,
                },
                now,
            )
            .await?;

        Ok(Semester {
            name: schedule.name,
            starts_at: schedule.starts_at,
            ends_at: schedule.ends_at,
            pre_thesis: schedule.pre_thesis,
            thesis: schedule.thesis,
            updated_at: now,
            ..current
        })
    }
}
