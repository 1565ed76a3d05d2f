//! Grading aggregator.
//!
//! Graders upsert one record per (work, grader, role). The aggregate is the
//! administrative override when present, otherwise the mean of all records.
//! Finalizing moves a work to `graded-approved` or `graded-failed`; closing
//! grading for a semester finalizes everything still open, writing a zero
//! "no submission" record for works nobody graded.

use serde::Serialize;
use thesis_core::entities::{GradeOverride, GradeRecord, SupervisedWork};
use thesis_core::enums::{EntityType, EventType, GraderRole};
use thesis_core::errors::WorkflowError;
use thesis_core::grading::{GradingPolicy, NO_SUBMISSION_FEEDBACK, validate_score};
use thesis_core::identity::{Actor, Administrator, Capability, Grader};
use thesis_core::ids::{PREFIX_GRADE, SYSTEM_GRADER};

use crate::error::DatabaseError;
use crate::events::{EventDraft, Outbox};
use crate::helpers::{
    fmt_datetime, generate_id, get_bool, get_opt_string, parse_datetime, parse_enum, query_all,
    query_opt,
};
use crate::locks::LockKey;
use crate::service::ThesisService;

use super::assignment::{ensure_not_graded, load_work, open_works_in_semester, store_work};
use super::semester::{load_semester, mark_grading_closed};

const SELECT_COLS: &str =
    "id, work_id, grader_id, role, score, feedback, synthetic, created_at, updated_at";

fn row_to_grade(row: &libsql::Row) -> Result<GradeRecord, DatabaseError> {
    Ok(GradeRecord {
        id: row.get(0)?,
        work_id: row.get(1)?,
        grader_id: row.get(2)?,
        role: parse_enum(&row.get::<String>(3)?)?,
        score: row.get(4)?,
        feedback: get_opt_string(row, 5)?,
        synthetic: get_bool(row, 6)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

/// Outcome of closing a semester's grading window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingReport {
    pub semester_id: String,
    /// Works finalized by the close, in creation order.
    pub finalized: Vec<SupervisedWork>,
}

async fn grades_for(
    conn: &libsql::Connection,
    work_id: &str,
) -> Result<Vec<GradeRecord>, DatabaseError> {
    query_all(
        conn,
        &format!("SELECT {SELECT_COLS} FROM grades WHERE work_id = ?1 ORDER BY created_at, id"),
        [work_id],
        row_to_grade,
    )
    .await
}

async fn insert_grade(conn: &libsql::Connection, grade: &GradeRecord) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO grades ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        libsql::params![
            grade.id.as_str(),
            grade.work_id.as_str(),
            grade.grader_id.as_str(),
            grade.role.as_str(),
            grade.score,
            grade.feedback.as_deref(),
            i64::from(grade.synthetic),
            fmt_datetime(&grade.created_at),
            fmt_datetime(&grade.updated_at)
        ],
    )
    .await?;
    Ok(())
}

/// Whether `grader` may record a grade under `role` for `work`.
fn check_eligibility(
    grader: &Grader,
    work: &SupervisedWork,
    role: GraderRole,
) -> Result<(), WorkflowError> {
    let is_supervisor = work.supervisor_id == grader.id();
    let is_reviewer = work.reviewer_id.as_deref() == Some(grader.id());
    let eligible = match role {
        GraderRole::Supervisor => is_supervisor,
        GraderRole::Reviewer => is_reviewer,
        GraderRole::Committee => !is_supervisor && !is_reviewer,
    };
    if eligible {
        Ok(())
    } else {
        Err(WorkflowError::unauthorized(
            grader.id(),
            format!("grade {} as {role}", work.id),
        ))
    }
}

impl ThesisService {
    /// Record or overwrite a grader's score for a work.
    ///
    /// # Errors
    ///
    /// `Validation` for a score outside `[0, 100]`, `Unauthorized` when the
    /// grader does not hold `role` on the work, `InvalidTransition` once the
    /// work is graded, `DeadlineExceeded` outside the grading window.
    pub async fn submit_grade(
        &self,
        grader: &Grader,
        work_id: &str,
        role: GraderRole,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<GradeRecord, DatabaseError> {
        validate_score(score)?;
        let guards = self.locks().lock(LockKey::Work(work_id.to_string())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .submit_grade_in_tx(&tx, &mut outbox, grader, work_id, role, score, feedback)
            .await;
        let grade = self.complete("submit_grade", guards, tx, outbox, result).await?;
        tracing::info!(%work_id, grader_id = %grade.grader_id, %role, score, "grade recorded");
        Ok(grade)
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_grade_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        grader: &Grader,
        work_id: &str,
        role: GraderRole,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<GradeRecord, DatabaseError> {
        let now = self.clock().now();
        let work = load_work(conn, work_id).await?;
        check_eligibility(grader, &work, role)?;
        ensure_not_graded(&work, "regraded")?;
        let semester = load_semester(conn, &work.semester_id).await?;
        self.clock().ensure_can_grade(&semester)?;

        let existing = query_opt(
            conn,
            &format!(
                "SELECT {SELECT_COLS} FROM grades
                 WHERE work_id = ?1 AND grader_id = ?2 AND role = ?3"
            ),
            libsql::params![work_id, grader.id(), role.as_str()],
            row_to_grade,
        )
        .await?;

        let grade = if let Some(mut grade) = existing {
            grade.score = score;
            grade.feedback = feedback.map(str::to_string);
            grade.updated_at = now;
            conn.execute(
                "UPDATE grades SET score = ?1, feedback = ?2, updated_at = ?3 WHERE id = ?4",
                libsql::params![
                    score,
                    grade.feedback.as_deref(),
                    fmt_datetime(&now),
                    grade.id.as_str()
                ],
            )
            .await?;
            grade
        } else {
            let grade = GradeRecord {
                id: generate_id(conn, PREFIX_GRADE).await?,
                work_id: work_id.to_string(),
                grader_id: grader.id().to_string(),
                role,
                score,
                feedback: feedback.map(str::to_string),
                synthetic: false,
                created_at: now,
                updated_at: now,
            };
            insert_grade(conn, &grade).await?;
            grade
        };

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::GradeSubmitted,
                    subject_type: EntityType::Work,
                    subject_id: work_id,
                    actor_id: grader.actor_id(),
                    detail: Some(serde_json::json!({
                        "grade_id": grade.id,
                        "role": role,
                        "score": score,
                    })),
                },
                now,
            )
            .await?;
        Ok(grade)
    }

    /// Store an administrative score that replaces the mean.
    ///
    /// # Errors
    ///
    /// `Validation` for an out-of-range score or an empty reason,
    /// `InvalidTransition` once the work is graded.
    pub async fn set_grade_override(
        &self,
        admin: &Administrator,
        work_id: &str,
        grade_override: GradeOverride,
    ) -> Result<SupervisedWork, DatabaseError> {
        validate_score(grade_override.score)?;
        if grade_override.reason.trim().is_empty() {
            return Err(WorkflowError::Validation("override reason is empty".into()).into());
        }
        self.write_override(admin, work_id, Some(grade_override))
            .await
    }

    /// # Errors
    ///
    /// `InvalidTransition` once the work is graded.
    pub async fn clear_grade_override(
        &self,
        admin: &Administrator,
        work_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        self.write_override(admin, work_id, None).await
    }

    async fn write_override(
        &self,
        admin: &Administrator,
        work_id: &str,
        grade_override: Option<GradeOverride>,
    ) -> Result<SupervisedWork, DatabaseError> {
        let guards = self.locks().lock(LockKey::Work(work_id.to_string())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .override_in_tx(&tx, &mut outbox, admin, work_id, grade_override)
            .await;
        let work = self.complete("grade_override", guards, tx, outbox, result).await?;
        tracing::info!(%work_id, grade_override = ?work.grade_override, "grade override updated");
        Ok(work)
    }

    async fn override_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        work_id: &str,
        grade_override: Option<GradeOverride>,
    ) -> Result<SupervisedWork, DatabaseError> {
        let now = self.clock().now();
        let mut work = load_work(conn, work_id).await?;
        ensure_not_graded(&work, "overridden")?;

        let (score, reason) = match &grade_override {
            Some(o) => (Some(o.score), Some(o.reason.as_str())),
            None => (None, None),
        };
        conn.execute(
            "UPDATE works SET grade_override = ?1, override_reason = ?2, updated_at = ?3
             WHERE id = ?4",
            libsql::params![score, reason, fmt_datetime(&now), work_id],
        )
        .await?;
        work.grade_override = score;
        work.updated_at = now;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::GradeOverridden,
                    subject_type: EntityType::Work,
                    subject_id: work_id,
                    actor_id: admin.actor_id(),
                    detail: Some(serde_json::json!({ "score": score, "reason": reason })),
                },
                now,
            )
            .await?;
        Ok(work)
    }

    /// Current aggregate score without finalizing. `None` while ungraded.
    ///
    /// # Errors
    ///
    /// `NotFound` if no work has this id.
    pub async fn aggregate(&self, work_id: &str) -> Result<Option<f64>, DatabaseError> {
        let conn = self.db().read().await?;
        let work = load_work(&conn, work_id).await?;
        let grades = grades_for(&conn, work_id).await?;
        Ok(GradingPolicy::aggregate(&grades, work.grade_override))
    }

    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_grades(&self, work_id: &str) -> Result<Vec<GradeRecord>, DatabaseError> {
        let conn = self.db().read().await?;
        grades_for(&conn, work_id).await
    }

    /// Finalize one work from its current aggregate.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the actor administers or supervises the work,
    /// `Validation` while the work has no grade and no override,
    /// `InvalidTransition` once graded, `DeadlineExceeded` outside the
    /// grading window.
    pub async fn finalize_work(
        &self,
        actor: &Actor,
        work_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        let guards = self.locks().lock(LockKey::Work(work_id.to_string())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self.finalize_in_tx(&tx, &mut outbox, actor, work_id).await;
        let work = self.complete("finalize_work", guards, tx, outbox, result).await?;
        tracing::info!(%work_id, status = %work.status, final_score = ?work.final_score, "work finalized");
        Ok(work)
    }

    async fn finalize_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        actor: &Actor,
        work_id: &str,
    ) -> Result<SupervisedWork, DatabaseError> {
        let now = self.clock().now();
        let mut work = load_work(conn, work_id).await?;
        let supervises = actor
            .supervisor()
            .is_ok_and(|s| s.id() == work.supervisor_id);
        if !supervises && actor.administrator().is_err() {
            return Err(
                WorkflowError::unauthorized(&actor.id, format!("finalize work {work_id}")).into(),
            );
        }
        ensure_not_graded(&work, "graded")?;
        let semester = load_semester(conn, &work.semester_id).await?;
        self.clock().ensure_can_grade(&semester)?;

        let grades = grades_for(conn, work_id).await?;
        let Some(score) = GradingPolicy::aggregate(&grades, work.grade_override) else {
            return Err(
                WorkflowError::Validation(format!("work {work_id} has no grades yet")).into(),
            );
        };
        self.grade_work(conn, outbox, &mut work, score, actor.actor_id(), now)
            .await?;
        Ok(work)
    }

    async fn grade_work(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        work: &mut SupervisedWork,
        score: f64,
        actor_id: &str,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), DatabaseError> {
        work.status = self.policy().outcome(score);
        work.final_score = Some(score);
        work.graded_at = Some(now);
        work.updated_at = now;
        store_work(conn, work).await?;
        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::WorkGraded,
                    subject_type: EntityType::Work,
                    subject_id: &work.id,
                    actor_id,
                    detail: Some(serde_json::json!({
                        "status": work.status,
                        "final_score": score,
                    })),
                },
                now,
            )
            .await
    }

    /// Close the semester's grading window and finalize every open work.
    ///
    /// # Errors
    ///
    /// `GradingWindowOpen` before the semester ends, `InvalidTransition` if
    /// grading was already closed.
    pub async fn close_grading(
        &self,
        admin: &Administrator,
        semester_id: &str,
    ) -> Result<GradingReport, DatabaseError> {
        let keys: Vec<LockKey> = {
            let conn = self.db().read().await?;
            open_works_in_semester(&conn, semester_id)
                .await?
                .into_iter()
                .map(|w| LockKey::Work(w.id))
                .collect()
        };
        let guards = self.locks().lock_all(keys).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .close_grading_in_tx(&tx, &mut outbox, admin, semester_id)
            .await;
        let report = self.complete("close_grading", guards, tx, outbox, result).await?;
        tracing::info!(
            %semester_id,
            finalized = report.finalized.len(),
            "grading closed"
        );
        Ok(report)
    }

    async fn close_grading_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        semester_id: &str,
    ) -> Result<GradingReport, DatabaseError> {
        let now = self.clock().now();
        let semester = load_semester(conn, semester_id).await?;
        if semester.grading_closed_at.is_some() {
            return Err(WorkflowError::invalid_transition(
                EntityType::Semester,
                semester_id,
                "grading-closed",
                "grading-closed",
            )
            .into());
        }
        if now <= semester.ends_at {
            return Err(WorkflowError::GradingWindowOpen {
                semester_id: semester_id.to_string(),
            }
            .into());
        }

        let mut finalized = Vec::new();
        for mut work in open_works_in_semester(conn, semester_id).await? {
            let grades = grades_for(conn, &work.id).await?;
            let score = match GradingPolicy::aggregate(&grades, work.grade_override) {
                Some(score) => score,
                None => {
                    let record = GradeRecord {
                        id: generate_id(conn, PREFIX_GRADE).await?,
                        work_id: work.id.clone(),
                        grader_id: SYSTEM_GRADER.to_string(),
                        role: GraderRole::Supervisor,
                        score: 0.0,
                        feedback: Some(NO_SUBMISSION_FEEDBACK.to_string()),
                        synthetic: true,
                        created_at: now,
                        updated_at: now,
                    };
                    insert_grade(conn, &record).await?;
                    tracing::debug!(work_id = %work.id, "no grades; recorded no-submission");
                    record.score
                }
            };
            self.grade_work(conn, outbox, &mut work, score, admin.actor_id(), now)
                .await?;
            finalized.push(work);
        }

        mark_grading_closed(conn, semester_id, now).await?;
        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::DeadlineClosed,
                    subject_type: EntityType::Semester,
                    subject_id: semester_id,
                    actor_id: admin.actor_id(),
                    detail: Some(serde_json::json!({ "finalized": finalized.len() })),
                },
                now,
            )
            .await?;
        Ok(GradingReport {
            semester_id: semester_id.to_string(),
            finalized,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use thesis_core::entities::Semester;
    use thesis_core::enums::{Track, WorkStatus};
    use thesis_core::errors::ErrorKind;

    use super::*;
    use crate::repos::NewAssignment;
    use crate::test_support::helpers::*;

    async fn thesis_work(env: &TestEnv, sem: &Semester, student_id: &str) -> SupervisedWork {
        env.service
            .assign_thesis(
                &teacher("tch-1").supervisor().unwrap(),
                NewAssignment {
                    student_id: student_id.into(),
                    semester_id: sem.id.clone(),
                    title: format!("Thesis of {student_id}"),
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    fn grader(id: &str) -> Grader {
        teacher(id).grader().unwrap()
    }

    #[tokio::test]
    async fn supervisor_grade_80_approves() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 2).await;
        let work = thesis_work(&env, &sem, "stu-1").await;

        env.service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, 80.0, Some("solid"))
            .await
            .unwrap();
        let work = env.service.finalize_work(&teacher("tch-1"), &work.id).await.unwrap();
        assert_eq!(work.status, WorkStatus::GradedApproved);
        assert_eq!(work.final_score, Some(80.0));
        assert!(env.events.types().contains(&EventType::WorkGraded));
    }

    #[rstest]
    #[case(49.9, WorkStatus::GradedFailed)]
    #[case(50.0, WorkStatus::GradedApproved)]
    #[tokio::test]
    async fn pass_mark_boundary(#[case] score: f64, #[case] expected: WorkStatus) {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 1).await;
        let work = thesis_work(&env, &sem, "stu-1").await;
        env.service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, score, None)
            .await
            .unwrap();
        let work = env.service.finalize_work(&admin(), &work.id).await.unwrap();
        assert_eq!(work.status, expected);
    }

    #[tokio::test]
    async fn regrade_overwrites_in_place() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 1).await;
        let work = thesis_work(&env, &sem, "stu-1").await;
        let first = env
            .service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, 40.0, None)
            .await
            .unwrap();
        let second = env
            .service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, 70.0, Some("better"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        let grades = env.service.list_grades(&work.id).await.unwrap();
        assert_eq!(grades.len(), 1);
        assert_eq!(grades[0].feedback.as_deref(), Some("better"));
        assert_eq!(env.service.aggregate(&work.id).await.unwrap(), Some(70.0));
    }

    #[tokio::test]
    async fn mean_across_roles_and_eligibility() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 1).await;
        let work = thesis_work(&env, &sem, "stu-1").await;
        env.service
            .assign_reviewer(&admin().administrator().unwrap(), &work.id, "tch-2")
            .await
            .unwrap();

        let err = env
            .service
            .submit_grade(&grader("tch-3"), &work.id, GraderRole::Reviewer, 60.0, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = env
            .service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Committee, 60.0, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        for (id, role, score) in [
            ("tch-1", GraderRole::Supervisor, 90.0),
            ("tch-2", GraderRole::Reviewer, 60.0),
            ("tch-3", GraderRole::Committee, 30.0),
        ] {
            env.service
                .submit_grade(&grader(id), &work.id, role, score, None)
                .await
                .unwrap();
        }
        assert_eq!(env.service.aggregate(&work.id).await.unwrap(), Some(60.0));
    }

    #[tokio::test]
    async fn override_replaces_mean_until_cleared() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 1).await;
        let work = thesis_work(&env, &sem, "stu-1").await;
        let adm = admin().administrator().unwrap();
        env.service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, 30.0, None)
            .await
            .unwrap();

        let err = env
            .service
            .set_grade_override(&adm, &work.id, GradeOverride { score: 65.0, reason: " ".into() })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        env.service
            .set_grade_override(
                &adm,
                &work.id,
                GradeOverride { score: 65.0, reason: "appeal upheld".into() },
            )
            .await
            .unwrap();
        assert_eq!(env.service.aggregate(&work.id).await.unwrap(), Some(65.0));

        env.service.clear_grade_override(&adm, &work.id).await.unwrap();
        assert_eq!(env.service.aggregate(&work.id).await.unwrap(), Some(30.0));
    }

    #[tokio::test]
    async fn finalize_needs_a_grade_and_authority() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 1).await;
        let work = thesis_work(&env, &sem, "stu-1").await;

        let err = env.service.finalize_work(&admin(), &work.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = env
            .service
            .finalize_work(&teacher("tch-9"), &work.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let err = env
            .service
            .finalize_work(&student("stu-1"), &work.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn grading_after_semester_end_is_deadline_exceeded() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 1).await;
        let work = thesis_work(&env, &sem, "stu-1").await;

        env.clock.set(sem.ends_at);
        env.service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, 70.0, None)
            .await
            .unwrap();
        env.clock.set(at("2026-07-01T00:00:00Z"));
        let err = env
            .service
            .submit_grade(&grader("tch-1"), &work.id, GraderRole::Supervisor, 75.0, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn close_grading_finalizes_every_open_work() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 2).await;
        let graded = thesis_work(&env, &sem, "stu-1").await;
        env.clock.advance(chrono::Duration::minutes(1));
        let silent = thesis_work(&env, &sem, "stu-2").await;
        env.service
            .submit_grade(&grader("tch-1"), &graded.id, GraderRole::Supervisor, 80.0, None)
            .await
            .unwrap();
        let adm = admin().administrator().unwrap();

        let err = env.service.close_grading(&adm, &sem.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GradingWindowOpen);

        env.clock.set(at("2026-07-01T00:00:00Z"));
        let report = env.service.close_grading(&adm, &sem.id).await.unwrap();
        let statuses: Vec<(String, WorkStatus)> = report
            .finalized
            .iter()
            .map(|w| (w.id.clone(), w.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (graded.id.clone(), WorkStatus::GradedApproved),
                (silent.id.clone(), WorkStatus::GradedFailed),
            ]
        );

        let synthetic = env.service.list_grades(&silent.id).await.unwrap();
        assert_eq!(synthetic.len(), 1);
        assert!(synthetic[0].synthetic);
        assert_eq!(synthetic[0].grader_id, SYSTEM_GRADER);
        assert_eq!(synthetic[0].feedback.as_deref(), Some(NO_SUBMISSION_FEEDBACK));

        let semester = env.service.get_semester(&sem.id).await.unwrap();
        assert!(semester.grading_closed_at.is_some());
        assert_eq!(env.events.types().last(), Some(&EventType::DeadlineClosed));

        let err = env.service.close_grading(&adm, &sem.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }
}
