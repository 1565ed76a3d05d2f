//! End-to-end supervision scenarios against an in-memory engine.

use std::sync::Arc;

use chrono::{DateTime, Offset, Utc};
use pretty_assertions::assert_eq;
use thesis_core::clock::{FixedClock, SemesterClock};
use thesis_core::entities::{Semester, TrackDeadlines};
use thesis_core::enums::{ApplicationStatus, EventType, GraderRole, Role, Track, WorkStatus};
use thesis_core::errors::ErrorKind;
use thesis_core::identity::Actor;
use thesis_core::ledger::LedgerKey;
use thesis_db::ThesisDb;
use thesis_db::events::{JsonlTransport, RecordingTransport};
use thesis_db::repos::{NewApplication, NewAssignment, NewSemester, NewTopic};
use thesis_db::service::{PendingPolicy, ThesisService};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

struct Harness {
    service: ThesisService,
    clock: Arc<FixedClock>,
    events: Arc<RecordingTransport>,
    semester: Semester,
}

async fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(at("2026-02-10T12:00:00Z")));
    let db = ThesisDb::open_local(":memory:").await.unwrap();
    let service = ThesisService::from_db(db, SemesterClock::new(clock.clone(), Utc.fix()));
    let events = Arc::new(RecordingTransport::new());
    service.add_transport(events.clone());
    let semester = service
        .create_semester(
            &admin().administrator().unwrap(),
            NewSemester {
                name: "Spring 2026".into(),
                starts_at: at("2026-02-01T00:00:00Z"),
                ends_at: at("2026-06-30T23:59:59Z"),
                pre_thesis: TrackDeadlines {
                    registration: at("2026-03-01T23:59:59Z"),
                    submission: at("2026-06-01T23:59:59Z"),
                },
                thesis: TrackDeadlines {
                    registration: at("2026-03-15T23:59:59Z"),
                    submission: at("2026-06-15T23:59:59Z"),
                },
            },
        )
        .await
        .unwrap();
    Harness {
        service,
        clock,
        events,
        semester,
    }
}

fn admin() -> Actor {
    Actor::new("adm-1", Role::Admin)
}

fn teacher(id: &str) -> Actor {
    Actor::new(id, Role::Teacher)
}

fn student(id: &str) -> Actor {
    Actor::new(id, Role::Student)
}

impl Harness {
    async fn ledger(&self, supervisor: &str, track: Track, max_slots: u32) -> LedgerKey {
        let key = LedgerKey::new(supervisor, &self.semester.id, track);
        self.service
            .provision_ledger(&admin().administrator().unwrap(), key.clone(), max_slots)
            .await
            .unwrap();
        key
    }

    async fn topic(&self, supervisor: &str, max_slots: u32) -> String {
        self.service
            .publish_topic(
                &teacher(supervisor).supervisor().unwrap(),
                NewTopic {
                    semester_id: self.semester.id.clone(),
                    track: Track::PreThesis,
                    title: "Lock-free queues".into(),
                    description: Some("Bounded MPMC designs".into()),
                    max_slots,
                },
            )
            .await
            .unwrap()
            .id
    }

    async fn apply(&self, student_id: &str, topic_id: &str) -> Result<String, ErrorKind> {
        self.service
            .submit_application(
                &student(student_id).student().unwrap(),
                NewApplication {
                    topic_id: topic_id.into(),
                    title: format!("{student_id} on {topic_id}"),
                    description: None,
                },
            )
            .await
            .map(|a| a.id)
            .map_err(|e| e.kind())
    }

    async fn remaining(&self, key: &LedgerKey) -> u32 {
        self.service.get_ledger(key).await.unwrap().remaining()
    }
}

#[tokio::test]
async fn single_slot_topic_admits_one_applicant() {
    let h = harness().await;
    let key = h.ledger("tch-1", Track::PreThesis, 1).await;
    let topic = h.topic("tch-1", 1).await;

    let first = h.apply("stu-a", &topic).await.unwrap();
    assert_eq!(h.remaining(&key).await, 0);
    assert_eq!(h.apply("stu-b", &topic).await, Err(ErrorKind::TopicClosed));

    let approval = h
        .service
        .approve_application(&teacher("tch-1").supervisor().unwrap(), &first)
        .await
        .unwrap();
    assert_eq!(approval.application.status, ApplicationStatus::Approved);
    let ledger = h.service.get_ledger(&key).await.unwrap();
    assert_eq!((ledger.reserved_slots, ledger.confirmed_slots), (0, 1));
    assert_eq!(h.apply("stu-b", &topic).await, Err(ErrorKind::TopicClosed));
}

#[tokio::test]
async fn rejection_frees_the_slot_for_the_next_applicant() {
    let h = harness().await;
    let key = h.ledger("tch-1", Track::PreThesis, 1).await;
    let topic = h.topic("tch-1", 1).await;
    let first = h.apply("stu-a", &topic).await.unwrap();

    h.service
        .reject_application(&teacher("tch-1").supervisor().unwrap(), &first, Some("out of scope"))
        .await
        .unwrap();
    assert_eq!(h.remaining(&key).await, 1);
    h.apply("stu-b", &topic).await.unwrap();
    assert_eq!(h.remaining(&key).await, 0);
}

#[tokio::test]
async fn direct_assignment_round_trips_capacity() {
    let h = harness().await;
    let key = h.ledger("tch-1", Track::Thesis, 2).await;
    let sup = teacher("tch-1").supervisor().unwrap();

    let work = h
        .service
        .assign_thesis(
            &sup,
            NewAssignment {
                student_id: "stu-a".into(),
                semester_id: h.semester.id.clone(),
                title: "Verified allocators".into(),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(h.remaining(&key).await, 1);
    h.service.unassign_work(&sup, &work.id).await.unwrap();
    assert_eq!(h.remaining(&key).await, 2);
}

#[tokio::test]
async fn one_active_application_per_track_by_default() {
    let h = harness().await;
    let key_2 = h.ledger("tch-2", Track::PreThesis, 1).await;
    h.ledger("tch-1", Track::PreThesis, 1).await;
    let topic_1 = h.topic("tch-1", 1).await;
    let topic_2 = h.topic("tch-2", 1).await;

    let first = h.apply("stu-a", &topic_1).await.unwrap();
    assert_eq!(
        h.apply("stu-a", &topic_2).await,
        Err(ErrorKind::DuplicateApplication)
    );
    assert_eq!(h.remaining(&key_2).await, 1);

    h.service
        .cancel_application(&student("stu-a").student().unwrap(), &first)
        .await
        .unwrap();
    h.apply("stu-a", &topic_2).await.unwrap();
    assert_eq!(h.remaining(&key_2).await, 0);
}

#[tokio::test]
async fn approve_cancels_pending_siblings_across_supervisors() {
    let mut h = harness().await;
    h.service = h.service.with_pending_policy(PendingPolicy::Parallel);
    let key_1 = h.ledger("tch-1", Track::PreThesis, 1).await;
    let key_2 = h.ledger("tch-2", Track::PreThesis, 1).await;
    let topic_1 = h.topic("tch-1", 1).await;
    let topic_2 = h.topic("tch-2", 1).await;

    let chosen = h.apply("stu-a", &topic_1).await.unwrap();
    let sibling = h.apply("stu-a", &topic_2).await.unwrap();
    assert_eq!(h.remaining(&key_2).await, 0);

    let approval = h
        .service
        .approve_application(&teacher("tch-1").supervisor().unwrap(), &chosen)
        .await
        .unwrap();
    assert_eq!(approval.cancelled.len(), 1);
    assert_eq!(approval.cancelled[0].id, sibling);
    assert_eq!(h.remaining(&key_1).await, 0);
    assert_eq!(h.remaining(&key_2).await, 1);

    let sibling = h.service.get_application(&sibling).await.unwrap();
    assert_eq!(sibling.status, ApplicationStatus::Cancelled);
    assert_eq!(
        sibling.decision_reason,
        Some(format!("superseded by {chosen}"))
    );
}

#[tokio::test]
async fn graded_and_ungraded_works_reach_terminal_states() {
    let h = harness().await;
    h.ledger("tch-1", Track::PreThesis, 2).await;
    let topic = h.topic("tch-1", 2).await;
    let sup = teacher("tch-1").supervisor().unwrap();

    let mut works = Vec::new();
    for stu in ["stu-a", "stu-b"] {
        let app = h.apply(stu, &topic).await.unwrap();
        works.push(h.service.approve_application(&sup, &app).await.unwrap().work);
    }
    h.service
        .submit_work(&student("stu-a").student().unwrap(), &works[0].id, "blob-7f3a")
        .await
        .unwrap();
    h.service
        .submit_grade(
            &teacher("tch-1").grader().unwrap(),
            &works[0].id,
            GraderRole::Supervisor,
            80.0,
            None,
        )
        .await
        .unwrap();
    assert_eq!(h.service.aggregate(&works[0].id).await.unwrap(), Some(80.0));

    h.clock.set(at("2026-07-01T00:00:00Z"));
    let report = h
        .service
        .close_grading(&admin().administrator().unwrap(), &h.semester.id)
        .await
        .unwrap();
    assert_eq!(report.finalized.len(), 2);
    assert_eq!(
        h.service.get_work(&works[0].id).await.unwrap().status,
        WorkStatus::GradedApproved
    );
    assert_eq!(
        h.service.get_work(&works[1].id).await.unwrap().status,
        WorkStatus::GradedFailed
    );

    let types = h.events.types();
    assert_eq!(
        types.iter().filter(|t| **t == EventType::WorkGraded).count(),
        2
    );
    assert_eq!(types.last(), Some(&EventType::DeadlineClosed));
}

#[tokio::test]
async fn deadline_boundary_is_inclusive() {
    let h = harness().await;
    h.ledger("tch-1", Track::PreThesis, 3).await;
    let topic = h.topic("tch-1", 3).await;

    h.clock.set(h.semester.pre_thesis.registration);
    h.apply("stu-a", &topic).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(1));
    assert_eq!(
        h.apply("stu-b", &topic).await,
        Err(ErrorKind::DeadlineExceeded)
    );
}

#[tokio::test]
async fn jsonl_transport_mirrors_the_log() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("events").join("thesis.jsonl");
    let h = harness().await;
    h.service
        .add_transport(Arc::new(JsonlTransport::new(&path).unwrap()));
    h.ledger("tch-1", Track::Thesis, 1).await;

    let lines: Vec<serde_json::Value> = serde_jsonlines::json_lines(&path)
        .unwrap()
        .collect::<std::io::Result<_>>()
        .unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["type"], "ledger_provisioned");
    assert_eq!(lines[0]["actor_id"], "adm-1");
}
