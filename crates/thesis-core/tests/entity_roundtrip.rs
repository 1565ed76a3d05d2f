//! Serde roundtrip and JsonSchema validation for the types that cross the
//! engine boundary (entities handed to collaborators, the event stream).

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use schemars::schema_for;
use thesis_core::entities::*;
use thesis_core::enums::*;
use thesis_core::ledger::{LedgerKey, SupervisionLedger};

fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(recovered, val, "serde roundtrip failed for {}", stringify!($ty));

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

roundtrip_and_validate!(
    semester_roundtrip,
    Semester,
    Semester {
        id: "sem-a3f8b2c1".into(),
        name: "Autumn 2026".into(),
        starts_at: at("2026-09-01T00:00:00Z"),
        ends_at: at("2027-01-31T23:59:59Z"),
        pre_thesis: TrackDeadlines {
            registration: at("2026-10-01T21:59:59Z"),
            submission: at("2027-01-10T21:59:59Z"),
        },
        thesis: TrackDeadlines {
            registration: at("2026-10-15T21:59:59Z"),
            submission: at("2027-01-20T21:59:59Z"),
        },
        grading_closed_at: None,
        created_at: at("2026-08-01T09:00:00Z"),
        updated_at: at("2026-08-01T09:00:00Z"),
    }
);

roundtrip_and_validate!(
    ledger_roundtrip,
    SupervisionLedger,
    SupervisionLedger {
        key: LedgerKey::new("tch-1", "sem-a3f8b2c1", Track::Thesis),
        max_slots: 4,
        reserved_slots: 1,
        confirmed_slots: 2,
        updated_at: at("2026-09-02T10:00:00Z"),
    }
);

roundtrip_and_validate!(
    application_roundtrip,
    Application,
    Application {
        id: "app-0011aabb".into(),
        student_id: "stu-7".into(),
        topic_id: "top-ffee0011".into(),
        supervisor_id: "tch-1".into(),
        semester_id: "sem-a3f8b2c1".into(),
        track: Track::PreThesis,
        title: "Lock-free ledgers".into(),
        description: Some("Comparing CAS and mutex designs".into()),
        status: ApplicationStatus::Rejected,
        decision_reason: Some("topic mismatch".into()),
        work_id: None,
        created_at: at("2026-09-05T08:00:00Z"),
        updated_at: at("2026-09-06T08:00:00Z"),
        decided_at: Some(at("2026-09-06T08:00:00Z")),
    }
);

roundtrip_and_validate!(
    work_roundtrip,
    SupervisedWork,
    SupervisedWork {
        id: "wrk-12345678".into(),
        student_id: "stu-7".into(),
        supervisor_id: "tch-1".into(),
        reviewer_id: Some("tch-2".into()),
        semester_id: "sem-a3f8b2c1".into(),
        track: Track::Thesis,
        topic_id: None,
        application_id: None,
        title: "Deadline-aware grading".into(),
        description: None,
        status: WorkStatus::GradedApproved,
        submission_deadline: at("2027-01-20T21:59:59Z"),
        grade_override: None,
        final_score: Some(72.5),
        created_at: at("2026-09-05T08:00:00Z"),
        updated_at: at("2027-01-25T08:00:00Z"),
        graded_at: Some(at("2027-01-25T08:00:00Z")),
    }
);

roundtrip_and_validate!(
    grade_roundtrip,
    GradeRecord,
    GradeRecord {
        id: "grd-00000001".into(),
        work_id: "wrk-12345678".into(),
        grader_id: "tch-2".into(),
        role: GraderRole::Reviewer,
        score: 65.0,
        feedback: Some("solid evaluation chapter".into()),
        synthetic: false,
        created_at: at("2027-01-22T08:00:00Z"),
        updated_at: at("2027-01-23T08:00:00Z"),
    }
);

roundtrip_and_validate!(
    event_roundtrip,
    DomainEvent,
    DomainEvent {
        id: "evt-deadbeef".into(),
        event_type: EventType::ApplicationApproved,
        subject_type: EntityType::Application,
        subject_id: "app-0011aabb".into(),
        actor_id: "tch-1".into(),
        detail: Some(serde_json::json!({ "work_id": "wrk-12345678" })),
        timestamp: at("2026-09-06T08:00:00Z"),
    }
);

#[test]
fn event_wire_shape_uses_type_key() {
    let event = DomainEvent {
        id: "evt-1".into(),
        event_type: EventType::WorkGraded,
        subject_type: EntityType::Work,
        subject_id: "wrk-1".into(),
        actor_id: "system".into(),
        detail: None,
        timestamp: at("2027-02-01T00:00:00Z"),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "work_graded");
    assert_eq!(json["subject_type"], "work");
    assert!(json.get("event_type").is_none());
}
