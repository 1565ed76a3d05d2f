//! Shared test utilities for thesis-db unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::sync::Arc;

    use chrono::{DateTime, Offset, Utc};
    use thesis_core::clock::{FixedClock, SemesterClock};
    use thesis_core::entities::{Semester, Topic, TrackDeadlines};
    use thesis_core::enums::{Role, Track};
    use thesis_core::identity::Actor;
    use thesis_core::ledger::{LedgerKey, SupervisionLedger};

    use crate::ThesisDb;
    use crate::events::RecordingTransport;
    use crate::repos::{NewSemester, NewTopic};
    use crate::service::ThesisService;

    pub fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    /// Service over `:memory:` with a settable clock and a recording transport.
    pub struct TestEnv {
        pub service: ThesisService,
        pub clock: Arc<FixedClock>,
        pub events: Arc<RecordingTransport>,
    }

    /// Clock starts inside Spring 2026 registration.
    pub async fn test_env() -> TestEnv {
        let clock = Arc::new(FixedClock::new(at("2026-02-15T09:00:00Z")));
        let db = ThesisDb::open_local(":memory:").await.unwrap();
        let service = ThesisService::from_db(db, SemesterClock::new(clock.clone(), Utc.fix()));
        let events = Arc::new(RecordingTransport::new());
        service.add_transport(events.clone());
        TestEnv {
            service,
            clock,
            events,
        }
    }

    pub fn admin() -> Actor {
        Actor::new("adm-1", Role::Admin)
    }

    pub fn teacher(id: &str) -> Actor {
        Actor::new(id, Role::Teacher)
    }

    pub fn student(id: &str) -> Actor {
        Actor::new(id, Role::Student)
    }

    pub fn spring_2026() -> NewSemester {
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
        }
    }

    pub async fn seed_semester(env: &TestEnv) -> Semester {
        env.service
            .create_semester(&admin().administrator().unwrap(), spring_2026())
            .await
            .unwrap()
    }

    pub async fn seed_ledger(
        env: &TestEnv,
        semester_id: &str,
        supervisor_id: &str,
        track: Track,
        max_slots: u32,
    ) -> SupervisionLedger {
        env.service
            .provision_ledger(
                &admin().administrator().unwrap(),
                LedgerKey::new(supervisor_id, semester_id, track),
                max_slots,
            )
            .await
            .unwrap()
    }

    pub async fn seed_topic(
        env: &TestEnv,
        semester_id: &str,
        supervisor_id: &str,
        track: Track,
        max_slots: u32,
    ) -> Topic {
        env.service
            .publish_topic(
                &teacher(supervisor_id).supervisor().unwrap(),
                NewTopic {
                    semester_id: semester_id.into(),
                    track,
                    title: format!("Topic by {supervisor_id}"),
                    description: None,
                    max_slots,
                },
            )
            .await
            .unwrap()
    }
}
