//! Supervised works: direct thesis assignment, reviewers, submissions.

use serde::{Deserialize, Serialize};
use thesis_core::entities::{SubmissionRef, SupervisedWork};
use thesis_core::enums::{EntityType, EventType, Phase, Track, WorkStatus};
use thesis_core::errors::WorkflowError;
use thesis_core::identity::{Administrator, Capability, Student, Supervisor};
use thesis_core::ids::PREFIX_WORK;
use thesis_core::ledger::{LedgerKey, SlotPool};

use crate::error::DatabaseError;
use crate::events::{EventDraft, Outbox};
use crate::helpers::{
    fmt_datetime, generate_id, get_opt_string, parse_datetime, parse_enum,
    parse_optional_datetime, query_all, query_opt,
};
use crate::locks::LockKey;
use crate::service::ThesisService;

use super::application::active_for_student;
use super::ledger::{SlotOp, move_slot};
use super::semester::load_semester;
use super::topic::release_topic_slot;

const SELECT_COLS: &str = "id, student_id, supervisor_id, reviewer_id, semester_id, track, \
     topic_id, application_id, title, description, status, submission_deadline, \
     grade_override, final_score, created_at, updated_at, graded_at";

fn row_to_work(row: &libsql::Row) -> Result<SupervisedWork, DatabaseError> {
    Ok(SupervisedWork {
        id: row.get(0)?,
        student_id: row.get(1)?,
        supervisor_id: row.get(2)?,
        reviewer_id: get_opt_string(row, 3)?,
        semester_id: row.get(4)?,
        track: parse_enum(&row.get::<String>(5)?)?,
        topic_id: get_opt_string(row, 6)?,
        application_id: get_opt_string(row, 7)?,
        title: row.get(8)?,
        description: get_opt_string(row, 9)?,
        status: parse_enum(&row.get::<String>(10)?)?,
        submission_deadline: parse_datetime(&row.get::<String>(11)?)?,
        grade_override: row.get::<Option<f64>>(12)?,
        final_score: row.get::<Option<f64>>(13)?,
        created_at: parse_datetime(&row.get::<String>(14)?)?,
        updated_at: parse_datetime(&row.get::<String>(15)?)?,
        graded_at: parse_optional_datetime(row.get::<Option<String>>(16)?.as_deref())?,
    })
}

fn row_to_submission(row: &libsql::Row) -> Result<SubmissionRef, DatabaseError> {
    Ok(SubmissionRef {
        work_id: row.get(0)?,
        file_ref: row.get(1)?,
        submitted_at: parse_datetime(&row.get::<String>(2)?)?,
    })
}

/// A supervisor's direct thesis assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub student_id: String,
    pub semester_id: String,
    pub title: String,
    pub description: Option<String>,
}

pub(crate) async fn load_work(
    conn: &libsql::Connection,
    id: &str,
) -> Result<SupervisedWork, DatabaseError> {
    query_opt(
        conn,
        &format!("SELECT {SELECT_COLS} FROM works WHERE id = ?1"),
        [id],
        row_to_work,
    )
    .await?
    .ok_or_else(|| WorkflowError::not_found(EntityType::Work, id).into())
}

pub(crate) async fn find_work_for_student(
    conn: &libsql::Connection,
    student_id: &str,
    semester_id: &str,
    track: Track,
) -> Result<Option<SupervisedWork>, DatabaseError> {
    query_opt(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM works
             WHERE student_id = ?1 AND semester_id = ?2 AND track = ?3"
        ),
        libsql::params![student_id, semester_id, track.as_str()],
        row_to_work,
    )
    .await
}

/// Non-terminal works of a semester, oldest first.
pub(crate) async fn open_works_in_semester(
    conn: &libsql::Connection,
    semester_id: &str,
) -> Result<Vec<SupervisedWork>, DatabaseError> {
    query_all(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM works
             WHERE semester_id = ?1 AND status IN ('active', 'submitted')
             ORDER BY created_at, id"
        ),
        [semester_id],
        row_to_work,
    )
    .await
}

pub(crate) async fn insert_work(
    conn: &libsql::Connection,
    work: &SupervisedWork,
) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO works ({SELECT_COLS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        libsql::params![
            work.id.as_str(),
            work.student_id.as_str(),
            work.supervisor_id.as_str(),
            work.reviewer_id.as_deref(),
            work.semester_id.as_str(),
            work.track.as_str(),
            work.topic_id.as_deref(),
            work.application_id.as_deref(),
            work.title.as_str(),
            work.description.as_deref(),
            work.status.as_str(),
            fmt_datetime(&work.submission_deadline),
            work.grade_override,
            work.final_score,
            fmt_datetime(&work.created_at),
            fmt_datetime(&work.updated_at),
            work.graded_at.as_ref().map(fmt_datetime)
        ],
    )
    .await?;
    Ok(())
}

/// Write back the mutable columns of a work.
pub(crate) async fn store_work(
    conn: &libsql::Connection,
    work: &SupervisedWork,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE works SET reviewer_id = ?1, status = ?2, grade_override = ?3, final_score = ?4,
             updated_at = ?5, graded_at = ?6
         WHERE id = ?7",
        libsql::params![
            work.reviewer_id.as_deref(),
            work.status.as_str(),
            work.grade_override,
            work.final_score,
            fmt_datetime(&work.updated_at),
            work.graded_at.as_ref().map(fmt_datetime),
            work.id.as_str()
        ],
    )
    .await?;
    Ok(())
}

pub(crate) fn ensure_not_graded(work: &SupervisedWork, to: &str) -> Result<(), WorkflowError> {
    if work.status.is_graded() {
        return Err(WorkflowError::invalid_transition(
            EntityType::Work,
            &work.id,
            work.status,
            to,
        ));
    }
    Ok(())
}

fn work_keys(work: &SupervisedWork) -> [LockKey; 3] {
    [
        LockKey::student(&work.student_id, &work.semester_id, work.track),
        LockKey::Ledger(work.ledger_key()),
        LockKey::Work(work.id.clone()),
    ]
}

impl ThesisService {
    /// Assign a thesis directly, without an application. Reserves and confirms
    /// one slot on the supervisor's thesis ledger.
    ///
    /// # Errors
    ///
    /// `NotFound` without a semester or ledger, `DeadlineExceeded` after the
    /// thesis registration deadline, `DuplicateApplication` when the student
    /// already holds a thesis work or an active thesis application,
    /// `SlotUnavailable` when the ledger is exhausted.
    pub async fn assign_thesis(
        &self,
        supervisor: &Supervisor,
        new: NewAssignment,
    ) -> Result<SupervisedWork, DatabaseError> {
        if new.title.trim().is_empty() {
            return Err(WorkflowError::Validation("thesis title is empty".into()).into());
        }
        let key = LedgerKey::new(supervisor.id(), &new.semester_id, Track::Thesis);
        let guards = self
            .locks()
            .lock_all([
                LockKey::student(&new.student_id, &new.semester_id, Track::Thesis),
                LockKey::Ledger(key.clone()),
            ])
            .await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .assign_in_tx(&tx, &mut outbox, supervisor, &key, new)
            .await;
        let work = self.complete("assign_thesis", guards, tx, outbox, result).await?;
        tracing::info!(work_id = %work.id, student_id = %work.student_id, ledger = %key, "thesis assigned");
        Ok(work)
    }

    async fn assign_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        supervisor: &Supervisor,
        key: &LedgerKey,
        new: NewAssignment,
    ) -> Result<SupervisedWork, DatabaseError> {
        let now = self.clock().now();
        let semester = load_semester(conn, &new.semester_id).await?;
        self.clock()
            .ensure_before_deadline(&semester, Track::Thesis, Phase::Registration)?;

        let taken = find_work_for_student(conn, &new.student_id, &new.semester_id, Track::Thesis)
            .await?
            .is_some()
            || !active_for_student(conn, &new.student_id, &new.semester_id, Track::Thesis)
                .await?
                .is_empty();
        if taken {
            return Err(WorkflowError::DuplicateApplication {
                student_id: new.student_id,
                track: Track::Thesis,
            }
            .into());
        }

        move_slot(conn, key, SlotOp::Allocate, now).await?;

        let work = SupervisedWork {
            id: generate_id(conn, PREFIX_WORK).await?,
            student_id: new.student_id,
            supervisor_id: supervisor.id().to_string(),
            reviewer_id: None,
            semester_id: new.semester_id,
            track: Track::Thesis,
            topic_id: None,
            application_id: None,
            title: new.title,
            description: new.description,
            status: WorkStatus::Active,
            submission_deadline: semester.deadline(Track::Thesis, Phase::Submission),
            grade_override: None,
            final_score: None,
            created_at: now,
            updated_at: now,
            graded_at: None,
        };
        insert_work(conn, &work).await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::WorkAssigned,
                    subject_type: EntityType::Work,
                    subject_id: &work.id,
                    actor_id: supervisor.actor_id(),
                    detail: Some(serde_json::json!({ "student_id": work.student_id })),
                },
                now,
            )
            .await?;
        Ok(work)
    }

    /// Remove a work before grading finalizes it and give its slot back. The
    /// work's grades and submissions go with it.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the caller supervises the work,
    /// `InvalidTransition` once it is graded.
    pub async fn unassign_work(
        &self,
        supervisor: &Supervisor,
        work_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        let work = self.get_work(work_id).await?;
        if work.supervisor_id != supervisor.id() {
            return Err(
                WorkflowError::unauthorized(supervisor.id(), format!("unassign work {work_id}"))
                    .into(),
            );
        }
        let guards = self.locks().lock_all(work_keys(&work)).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .unassign_in_tx(&tx, &mut outbox, supervisor, work_id)
            .await;
        let work = self.complete("unassign_work", guards, tx, outbox, result).await?;
        tracing::info!(%work_id, ledger = %work.ledger_key(), "work unassigned");
        Ok(work)
    }

    async fn unassign_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        supervisor: &Supervisor,
        work_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        let now = self.clock().now();
        let work = load_work(conn, work_id).await?;
        ensure_not_graded(&work, "unassigned")?;

        move_slot(
            conn,
            &work.ledger_key(),
            SlotOp::Release(SlotPool::Confirmed),
            now,
        )
        .await?;
        if let Some(topic_id) = &work.topic_id {
            release_topic_slot(conn, topic_id, now).await?;
        }
        conn.execute("DELETE FROM works WHERE id = ?1", [work_id])
            .await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::WorkUnassigned,
                    subject_type: EntityType::Work,
                    subject_id: work_id,
                    actor_id: supervisor.actor_id(),
                    detail: Some(serde_json::json!({
                        "student_id": work.student_id,
                        "topic_id": work.topic_id,
                    })),
                },
                now,
            )
            .await?;
        Ok(work)
    }

    /// # Errors
    ///
    /// `Validation` if the reviewer supervises the work, `InvalidTransition`
    /// once it is graded.
    pub async fn assign_reviewer(
        &self,
        admin: &Administrator,
        work_id: &str,
        reviewer_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        let guards = self.locks().lock(LockKey::Work(work_id.to_string())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .assign_reviewer_in_tx(&tx, &mut outbox, admin, work_id, reviewer_id)
            .await;
        let work = self.complete("assign_reviewer", guards, tx, outbox, result).await?;
        tracing::info!(%work_id, %reviewer_id, "reviewer assigned");
        Ok(work)
    }

    async fn assign_reviewer_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        work_id: &str,
        reviewer_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        let now = self.clock().now();
        let mut work = load_work(conn, work_id).await?;
        ensure_not_graded(&work, "reviewed")?;
        if work.supervisor_id == reviewer_id {
            return Err(WorkflowError::Validation(format!(
                "{reviewer_id} supervises {work_id} and cannot review it"
            ))
            .into());
        }
        work.reviewer_id = Some(reviewer_id.to_string());
        work.updated_at = now;
        store_work(conn, &work).await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::ReviewerAssigned,
                    subject_type: EntityType::Work,
                    subject_id: work_id,
                    actor_id: admin.actor_id(),
                    detail: Some(serde_json::json!({ "reviewer_id": reviewer_id })),
                },
                now,
            )
            .await?;
        Ok(work)
    }

    /// Attach a submission reference. Re-submission is allowed until the
    /// submission deadline.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the caller owns the work, `DeadlineExceeded`
    /// after the submission deadline, `InvalidTransition` once graded.
    pub async fn submit_work(
        &self,
        student: &Student,
        work_id: &str,
        file_ref: &str,
    ) -> Result<SubmissionRef, DatabaseError> {
        if file_ref.trim().is_empty() {
            return Err(WorkflowError::Validation("submission reference is empty".into()).into());
        }
        let guards = self.locks().lock(LockKey::Work(work_id.to_string())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .submit_work_in_tx(&tx, &mut outbox, student, work_id, file_ref)
            .await;
        let submission = self.complete("submit_work", guards, tx, outbox, result).await?;
        tracing::info!(%work_id, "work submitted");
        Ok(submission)
    }

    async fn submit_work_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        student: &Student,
        work_id: &str,
        file_ref: &str,
    ) -> Result<SubmissionRef, DatabaseError> {
        let now = self.clock().now();
        let mut work = load_work(conn, work_id).await?;
        if work.student_id != student.id() {
            return Err(
                WorkflowError::unauthorized(student.id(), format!("submit work {work_id}")).into(),
            );
        }
        if !work.status.can_transition_to(WorkStatus::Submitted) {
            return Err(WorkflowError::invalid_transition(
                EntityType::Work,
                work_id,
                work.status,
                WorkStatus::Submitted,
            )
            .into());
        }
        let semester = load_semester(conn, &work.semester_id).await?;
        self.clock()
            .ensure_before_deadline(&semester, work.track, Phase::Submission)?;

        conn.execute(
            "INSERT INTO work_submissions (work_id, file_ref, submitted_at) VALUES (?1, ?2, ?3)",
            libsql::params![work_id, file_ref, fmt_datetime(&now)],
        )
        .await?;
        work.status = WorkStatus::Submitted;
        work.updated_at = now;
        store_work(conn, &work).await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::WorkSubmitted,
                    subject_type: EntityType::Work,
                    subject_id: work_id,
                    actor_id: student.actor_id(),
                    detail: Some(serde_json::json!({ "file_ref": file_ref })),
                },
                now,
            )
            .await?;
        Ok(SubmissionRef {
            work_id: work_id.to_string(),
            file_ref: file_ref.to_string(),
            submitted_at: now,
        })
    }

    /// # Errors
    ///
    /// `NotFound` if no work has this id.
    pub async fn get_work(&self, id: &str) -> Result<SupervisedWork, DatabaseError> {
        let conn = self.db().read().await?;
        load_work(&conn, id).await
    }

    /// Works a teacher supervises, optionally within one semester.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_works_for_supervisor(
        &self,
        supervisor_id: &str,
        semester_id: Option<&str>,
    ) -> Result<Vec<SupervisedWork>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {SELECT_COLS} FROM works
                 WHERE supervisor_id = ?1 AND (?2 IS NULL OR semester_id = ?2)
                 ORDER BY created_at, id"
            ),
            libsql::params![supervisor_id, semester_id],
            row_to_work,
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_works_for_student(
        &self,
        student_id: &str,
    ) -> Result<Vec<SupervisedWork>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {SELECT_COLS} FROM works WHERE student_id = ?1 ORDER BY created_at, id"
            ),
            [student_id],
            row_to_work,
        )
        .await
    }

    /// Submission references of a work, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_submissions(
        &self,
        work_id: &str,
    ) -> Result<Vec<SubmissionRef>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            "SELECT work_id, file_ref, submitted_at FROM work_submissions
             WHERE work_id = ?1 ORDER BY id",
            [work_id],
            row_to_submission,
        )
        .await
    }
}
