//! Application workflow: student → topic applications.
//!
//! ```text
//! submit   reserve ledger slot, take topic slot          → pending
//! approve  confirm ledger slot, create work, cancel rest  → approved
//! reject   release ledger and topic slot                  → rejected
//! cancel   release ledger and topic slot (student)        → cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thesis_core::entities::{Application, SupervisedWork};
use thesis_core::enums::{ApplicationStatus, EntityType, EventType, Phase, Track, WorkStatus};
use thesis_core::errors::WorkflowError;
use thesis_core::identity::{Capability, Student, Supervisor};
use thesis_core::ids::{PREFIX_APPLICATION, PREFIX_WORK};
use thesis_core::ledger::{LedgerKey, SlotPool};

use crate::error::DatabaseError;
use crate::events::{EventDraft, Outbox};
use crate::helpers::{
    fmt_datetime, generate_id, get_opt_string, parse_datetime, parse_enum,
    parse_optional_datetime, query_all, query_opt,
};
use crate::locks::LockKey;
use crate::service::{PendingPolicy, ThesisService};

use super::assignment::{find_work_for_student, insert_work};
use super::ledger::{SlotOp, move_slot};
use super::semester::load_semester;
use super::topic::{load_topic, release_topic_slot, take_topic_slot};

const SELECT_COLS: &str = "id, student_id, topic_id, supervisor_id, semester_id, track, title, \
     description, status, decision_reason, work_id, created_at, updated_at, decided_at";

fn row_to_application(row: &libsql::Row) -> Result<Application, DatabaseError> {
    Ok(Application {
        id: row.get(0)?,
        student_id: row.get(1)?,
        topic_id: row.get(2)?,
        supervisor_id: row.get(3)?,
        semester_id: row.get(4)?,
        track: parse_enum(&row.get::<String>(5)?)?,
        title: row.get(6)?,
        description: get_opt_string(row, 7)?,
        status: parse_enum(&row.get::<String>(8)?)?,
        decision_reason: get_opt_string(row, 9)?,
        work_id: get_opt_string(row, 10)?,
        created_at: parse_datetime(&row.get::<String>(11)?)?,
        updated_at: parse_datetime(&row.get::<String>(12)?)?,
        decided_at: parse_optional_datetime(row.get::<Option<String>>(13)?.as_deref())?,
    })
}

fn ledger_key(application: &Application) -> LedgerKey {
    LedgerKey::new(
        &application.supervisor_id,
        &application.semester_id,
        application.track,
    )
}

fn student_key(application: &Application) -> LockKey {
    LockKey::student(
        &application.student_id,
        &application.semester_id,
        application.track,
    )
}

/// What a student submits with an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub topic_id: String,
    pub title: String,
    pub description: Option<String>,
}

/// Result of an approval: the approved application, the work it created and
/// the student's other applications that were cancelled along with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Approval {
    pub application: Application,
    pub work: SupervisedWork,
    pub cancelled: Vec<Application>,
}

async fn load_application(
    conn: &libsql::Connection,
    id: &str,
) -> Result<Application, DatabaseError> {
    query_opt(
        conn,
        &format!("SELECT {SELECT_COLS} FROM applications WHERE id = ?1"),
        [id],
        row_to_application,
    )
    .await?
    .ok_or_else(|| WorkflowError::not_found(EntityType::Application, id).into())
}

/// Applications holding a slot for one student in one semester and track:
/// pending ones, and approved ones whose work still exists.
pub(crate) async fn active_for_student(
    conn: &libsql::Connection,
    student_id: &str,
    semester_id: &str,
    track: Track,
) -> Result<Vec<Application>, DatabaseError> {
    query_all(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM applications
             WHERE student_id = ?1 AND semester_id = ?2 AND track = ?3
               AND (status = 'pending' OR (status = 'approved' AND work_id IS NOT NULL))
             ORDER BY created_at, id"
        ),
        libsql::params![student_id, semester_id, track.as_str()],
        row_to_application,
    )
    .await
}

async fn store_decision(
    conn: &libsql::Connection,
    application: &Application,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE applications
         SET status = ?1, decision_reason = ?2, work_id = ?3, updated_at = ?4, decided_at = ?5
         WHERE id = ?6",
        libsql::params![
            application.status.as_str(),
            application.decision_reason.as_deref(),
            application.work_id.as_deref(),
            fmt_datetime(&application.updated_at),
            application.decided_at.as_ref().map(fmt_datetime),
            application.id.as_str()
        ],
    )
    .await?;
    Ok(())
}

fn ensure_transition(
    application: &Application,
    next: ApplicationStatus,
) -> Result<(), WorkflowError> {
    if application.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(WorkflowError::invalid_transition(
            EntityType::Application,
            &application.id,
            application.status,
            next,
        ))
    }
}

/// Move a pending application to a terminal state and give its slot back.
async fn close_pending(
    conn: &libsql::Connection,
    application: &mut Application,
    next: ApplicationStatus,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    ensure_transition(application, next)?;
    move_slot(
        conn,
        &ledger_key(application),
        SlotOp::Release(SlotPool::Reserved),
        now,
    )
    .await?;
    release_topic_slot(conn, &application.topic_id, now).await?;
    application.status = next;
    application.decision_reason = reason;
    application.updated_at = now;
    application.decided_at = Some(now);
    store_decision(conn, application).await
}

impl ThesisService {
    /// Apply to a topic. Reserves a slot on the supervisor's ledger and on
    /// the topic.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown topic, `DeadlineExceeded` after the
    /// registration deadline, `DuplicateApplication` when the student already
    /// holds an active application or a work in this semester and track,
    /// `SlotUnavailable` when the ledger is exhausted, `TopicClosed` when the
    /// topic is full or withdrawn.
    pub async fn submit_application(
        &self,
        student: &Student,
        new: NewApplication,
    ) -> Result<Application, DatabaseError> {
        if new.title.trim().is_empty() {
            return Err(WorkflowError::Validation("application title is empty".into()).into());
        }
        let topic = self.get_topic(&new.topic_id).await?;
        let key = LedgerKey::new(&topic.supervisor_id, &topic.semester_id, topic.track);
        let guards = self
            .locks()
            .lock_all([
                LockKey::student(student.id(), &topic.semester_id, topic.track),
                LockKey::Ledger(key.clone()),
            ])
            .await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self.submit_in_tx(&tx, &mut outbox, student, &key, new).await;
        let application = self
            .complete("submit_application", guards, tx, outbox, result)
            .await?;
        tracing::info!(
            application_id = %application.id,
            student_id = %application.student_id,
            topic_id = %application.topic_id,
            "application submitted"
        );
        Ok(application)
    }

    async fn submit_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        student: &Student,
        key: &LedgerKey,
        new: NewApplication,
    ) -> Result<Application, DatabaseError> {
        let now = self.clock().now();
        let topic = load_topic(conn, &new.topic_id).await?;
        let semester = load_semester(conn, &topic.semester_id).await?;
        self.clock()
            .ensure_before_deadline(&semester, topic.track, Phase::Registration)?;

        let duplicate = || WorkflowError::DuplicateApplication {
            student_id: student.id().to_string(),
            track: topic.track,
        };
        if find_work_for_student(conn, student.id(), &topic.semester_id, topic.track)
            .await?
            .is_some()
        {
            return Err(duplicate().into());
        }
        let active = active_for_student(conn, student.id(), &topic.semester_id, topic.track).await?;
        let clash = match self.pending_policy() {
            PendingPolicy::Parallel => active
                .iter()
                .any(|a| a.topic_id == topic.id || a.status == ApplicationStatus::Approved),
            PendingPolicy::Exclusive => !active.is_empty(),
        };
        if clash {
            return Err(duplicate().into());
        }

        move_slot(conn, key, SlotOp::Reserve, now).await?;
        take_topic_slot(conn, &topic.id, now).await?;

        let id = generate_id(conn, PREFIX_APPLICATION).await?;
        conn.execute(
            &format!(
                "INSERT INTO applications ({SELECT_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', NULL, NULL, ?9, ?9, NULL)"
            ),
            libsql::params![
                id.as_str(),
                student.id(),
                topic.id.as_str(),
                topic.supervisor_id.as_str(),
                topic.semester_id.as_str(),
                topic.track.as_str(),
                new.title.as_str(),
                new.description.as_deref(),
                fmt_datetime(&now)
            ],
        )
        .await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::ApplicationSubmitted,
                    subject_type: EntityType::Application,
                    subject_id: &id,
                    actor_id: student.actor_id(),
                    detail: Some(serde_json::json!({
                        "topic_id": topic.id,
                        "supervisor_id": topic.supervisor_id,
                    })),
                },
                now,
            )
            .await?;

        Ok(Application {
            id,
            student_id: student.id().to_string(),
            topic_id: topic.id,
            supervisor_id: topic.supervisor_id,
            semester_id: topic.semester_id,
            track: topic.track,
            title: new.title,
            description: new.description,
            status: ApplicationStatus::Pending,
            decision_reason: None,
            work_id: None,
            created_at: now,
            updated_at: now,
            decided_at: None,
        })
    }

    /// Approve a pending application: confirm its slot, create the supervised
    /// work, and cancel the student's other pending applications in the track.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the caller supervises the topic,
    /// `InvalidTransition` unless pending, `DeadlineExceeded` after the
    /// registration deadline.
    pub async fn approve_application(
        &self,
        supervisor: &Supervisor,
        application_id: &str,
    ) -> Result<Approval, DatabaseError> {
        let application = self.get_application(application_id).await?;
        if application.supervisor_id != supervisor.id() {
            return Err(WorkflowError::unauthorized(
                supervisor.id(),
                format!("approve application {application_id}"),
            )
            .into());
        }

        let student = self.locks().lock(student_key(&application)).await;
        let siblings = {
            let conn = self.db().read().await?;
            active_for_student(
                &conn,
                &application.student_id,
                &application.semester_id,
                application.track,
            )
            .await?
        };
        let ledgers = self
            .locks()
            .lock_all(
                siblings
                    .iter()
                    .chain(std::iter::once(&application))
                    .map(|a| LockKey::Ledger(ledger_key(a))),
            )
            .await;

        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .approve_in_tx(&tx, &mut outbox, supervisor, application_id)
            .await;
        let approval = self
            .complete(
                "approve_application",
                student.merge(ledgers),
                tx,
                outbox,
                result,
            )
            .await?;
        tracing::info!(
            %application_id,
            work_id = %approval.work.id,
            auto_cancelled = approval.cancelled.len(),
            "application approved"
        );
        Ok(approval)
    }

    async fn approve_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        supervisor: &Supervisor,
        application_id: &str,
    ) -> Result<Approval, DatabaseError> {
        let now = self.clock().now();
        let mut application = load_application(conn, application_id).await?;
        ensure_transition(&application, ApplicationStatus::Approved)?;
        let semester = load_semester(conn, &application.semester_id).await?;
        self.clock()
            .ensure_before_deadline(&semester, application.track, Phase::Registration)?;
        if find_work_for_student(
            conn,
            &application.student_id,
            &application.semester_id,
            application.track,
        )
        .await?
        .is_some()
        {
            return Err(WorkflowError::DuplicateApplication {
                student_id: application.student_id.clone(),
                track: application.track,
            }
            .into());
        }

        move_slot(conn, &ledger_key(&application), SlotOp::Confirm, now).await?;

        let work = SupervisedWork {
            id: generate_id(conn, PREFIX_WORK).await?,
            student_id: application.student_id.clone(),
            supervisor_id: application.supervisor_id.clone(),
            reviewer_id: None,
            semester_id: application.semester_id.clone(),
            track: application.track,
            topic_id: Some(application.topic_id.clone()),
            application_id: Some(application.id.clone()),
            title: application.title.clone(),
            description: application.description.clone(),
            status: WorkStatus::Active,
            submission_deadline: semester.deadline(application.track, Phase::Submission),
            grade_override: None,
            final_score: None,
            created_at: now,
            updated_at: now,
            graded_at: None,
        };
        insert_work(conn, &work).await?;

        application.status = ApplicationStatus::Approved;
        application.work_id = Some(work.id.clone());
        application.updated_at = now;
        application.decided_at = Some(now);
        store_decision(conn, &application).await?;
        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::ApplicationApproved,
                    subject_type: EntityType::Application,
                    subject_id: &application.id,
                    actor_id: supervisor.actor_id(),
                    detail: Some(serde_json::json!({ "work_id": work.id })),
                },
                now,
            )
            .await?;

        let mut cancelled = Vec::new();
        let others = active_for_student(
            conn,
            &application.student_id,
            &application.semester_id,
            application.track,
        )
        .await?;
        for mut other in others
            .into_iter()
            .filter(|a| a.id != application.id && a.status == ApplicationStatus::Pending)
        {
            close_pending(
                conn,
                &mut other,
                ApplicationStatus::Cancelled,
                Some(format!("superseded by {}", application.id)),
                now,
            )
            .await?;
            outbox
                .record(
                    conn,
                    EventDraft {
                        event_type: EventType::ApplicationCancelled,
                        subject_type: EntityType::Application,
                        subject_id: &other.id,
                        actor_id: supervisor.actor_id(),
                        detail: Some(serde_json::json!({ "superseded_by": application.id })),
                    },
                    now,
                )
                .await?;
            cancelled.push(other);
        }

        Ok(Approval {
            application,
            work,
            cancelled,
        })
    }

    /// Reject a pending application and release its slot.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the caller supervises the topic,
    /// `InvalidTransition` unless pending, `DeadlineExceeded` after the
    /// registration deadline.
    pub async fn reject_application(
        &self,
        supervisor: &Supervisor,
        application_id: &str,
        reason: Option<&str>,
    ) -> Result<Application, DatabaseError> {
        let application = self.get_application(application_id).await?;
        let guards = self
            .locks()
            .lock(LockKey::Ledger(ledger_key(&application)))
            .await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .reject_in_tx(&tx, &mut outbox, supervisor, application_id, reason)
            .await;
        let application = self
            .complete("reject_application", guards, tx, outbox, result)
            .await?;
        tracing::info!(%application_id, "application rejected");
        Ok(application)
    }

    async fn reject_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        supervisor: &Supervisor,
        application_id: &str,
        reason: Option<&str>,
    ) -> Result<Application, DatabaseError> {
        let now = self.clock().now();
        let mut application = load_application(conn, application_id).await?;
        if application.supervisor_id != supervisor.id() {
            return Err(WorkflowError::unauthorized(
                supervisor.id(),
                format!("reject application {application_id}"),
            )
            .into());
        }
        ensure_transition(&application, ApplicationStatus::Rejected)?;
        let semester = load_semester(conn, &application.semester_id).await?;
        self.clock()
            .ensure_before_deadline(&semester, application.track, Phase::Registration)?;

        close_pending(
            conn,
            &mut application,
            ApplicationStatus::Rejected,
            reason.map(String::from),
            now,
        )
        .await?;
        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::ApplicationRejected,
                    subject_type: EntityType::Application,
                    subject_id: application_id,
                    actor_id: supervisor.actor_id(),
                    detail: reason.map(|r| serde_json::json!({ "reason": r })),
                },
                now,
            )
            .await?;
        Ok(application)
    }

    /// Withdraw a pending application. Available at any time.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the caller is the applicant, `InvalidTransition`
    /// unless pending.
    pub async fn cancel_application(
        &self,
        student: &Student,
        application_id: &str,
    ) -> Result<Application, DatabaseError> {
        let application = self.get_application(application_id).await?;
        if application.student_id != student.id() {
            return Err(WorkflowError::unauthorized(
                student.id(),
                format!("cancel application {application_id}"),
            )
            .into());
        }
        let guards = self
            .locks()
            .lock_all([
                student_key(&application),
                LockKey::Ledger(ledger_key(&application)),
            ])
            .await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .cancel_in_tx(&tx, &mut outbox, student, application_id)
            .await;
        let application = self
            .complete("cancel_application", guards, tx, outbox, result)
            .await?;
        tracing::info!(%application_id, "application cancelled");
        Ok(application)
    }

    async fn cancel_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        student: &Student,
        application_id: &str,
    ) -> Result<Application, DatabaseError> {
        let now = self.clock().now();
        let mut application = load_application(conn, application_id).await?;
        close_pending(conn, &mut application, ApplicationStatus::Cancelled, None, now).await?;
        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::ApplicationCancelled,
                    subject_type: EntityType::Application,
                    subject_id: application_id,
                    actor_id: student.actor_id(),
                    detail: None,
                },
                now,
            )
            .await?;
        Ok(application)
    }

    /// # Errors
    ///
    /// `NotFound` if no application has this id.
    pub async fn get_application(&self, id: &str) -> Result<Application, DatabaseError> {
        let conn = self.db().read().await?;
        load_application(&conn, id).await
    }

    /// A student's applications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_applications_for_student(
        &self,
        student_id: &str,
        semester_id: Option<&str>,
    ) -> Result<Vec<Application>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {SELECT_COLS} FROM applications
                 WHERE student_id = ?1 AND (?2 IS NULL OR semester_id = ?2)
                 ORDER BY created_at DESC, id"
            ),
            libsql::params![student_id, semester_id],
            row_to_application,
        )
        .await
    }

    /// Applications awaiting this supervisor's decision, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_pending_for_supervisor(
        &self,
        supervisor_id: &str,
        semester_id: Option<&str>,
    ) -> Result<Vec<Application>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {SELECT_COLS} FROM applications
                 WHERE supervisor_id = ?1 AND status = 'pending'
                   AND (?2 IS NULL OR semester_id = ?2)
                 ORDER BY created_at, id"
            ),
            libsql::params![supervisor_id, semester_id],
            row_to_application,
        )
        .await
    }
}
