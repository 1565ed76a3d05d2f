//! Topic catalog: supervisor-published topics with their own sub-capacity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thesis_core::entities::Topic;
use thesis_core::enums::{EntityType, EventType, Phase, TopicStatus, Track};
use thesis_core::errors::WorkflowError;
use thesis_core::identity::{Capability, Supervisor};
use thesis_core::ids::PREFIX_TOPIC;
use thesis_core::ledger::LedgerKey;

use crate::error::DatabaseError;
use crate::events::{EventDraft, Outbox};
use crate::helpers::{
    fmt_datetime, generate_id, get_bool, get_opt_string, get_u32, parse_datetime, parse_enum,
    query_all, query_opt,
};
use crate::locks::LockKey;
use crate::service::ThesisService;

use super::ledger::load_ledger;
use super::semester::load_semester;

const SELECT_COLS: &str = "id, supervisor_id, semester_id, track, title, description, \
     max_slots, taken_slots, status, withdrawn, created_at, updated_at";

fn row_to_topic(row: &libsql::Row) -> Result<Topic, DatabaseError> {
    Ok(Topic {
        id: row.get(0)?,
        supervisor_id: row.get(1)?,
        semester_id: row.get(2)?,
        track: parse_enum(&row.get::<String>(3)?)?,
        title: row.get(4)?,
        description: get_opt_string(row, 5)?,
        max_slots: get_u32(row, 6)?,
        taken_slots: get_u32(row, 7)?,
        status: parse_enum(&row.get::<String>(8)?)?,
        withdrawn: get_bool(row, 9)?,
        created_at: parse_datetime(&row.get::<String>(10)?)?,
        updated_at: parse_datetime(&row.get::<String>(11)?)?,
    })
}

/// A topic as submitted by its supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    pub semester_id: String,
    pub track: Track,
    pub title: String,
    pub description: Option<String>,
    pub max_slots: u32,
}

pub(crate) async fn load_topic(conn: &libsql::Connection, id: &str) -> Result<Topic, DatabaseError> {
    query_opt(
        conn,
        &format!("SELECT {SELECT_COLS} FROM topics WHERE id = ?1"),
        [id],
        row_to_topic,
    )
    .await?
    .ok_or_else(|| WorkflowError::not_found(EntityType::Topic, id).into())
}

async fn store_counts(
    conn: &libsql::Connection,
    topic: &Topic,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE topics SET taken_slots = ?1, status = ?2, withdrawn = ?3, updated_at = ?4
         WHERE id = ?5",
        libsql::params![
            i64::from(topic.taken_slots),
            topic.status.as_str(),
            i64::from(topic.withdrawn),
            fmt_datetime(&now),
            topic.id.as_str()
        ],
    )
    .await?;
    Ok(())
}

/// Count one application against the topic.
///
/// # Errors
///
/// `TopicClosed` when the topic is full or withdrawn.
pub(crate) async fn take_topic_slot(
    conn: &libsql::Connection,
    topic_id: &str,
    now: DateTime<Utc>,
) -> Result<Topic, DatabaseError> {
    let mut topic = load_topic(conn, topic_id).await?;
    if topic.derived_status() == TopicStatus::Closed {
        return Err(WorkflowError::TopicClosed {
            topic_id: topic_id.to_string(),
        }
        .into());
    }
    topic.taken_slots += 1;
    topic.status = topic.derived_status();
    topic.updated_at = now;
    store_counts(conn, &topic, now).await?;
    Ok(topic)
}

/// Return one slot to the topic, reopening it unless withdrawn.
///
/// # Errors
///
/// `InvariantViolation` if the topic holds no slot.
pub(crate) async fn release_topic_slot(
    conn: &libsql::Connection,
    topic_id: &str,
    now: DateTime<Utc>,
) -> Result<Topic, DatabaseError> {
    let mut topic = load_topic(conn, topic_id).await?;
    if topic.taken_slots == 0 {
        let error = WorkflowError::InvariantViolation(format!(
            "topic {topic_id} has no taken slot to release"
        ));
        tracing::error!(%topic_id, %error, "topic counter underflow");
        return Err(error.into());
    }
    topic.taken_slots -= 1;
    topic.status = topic.derived_status();
    topic.updated_at = now;
    store_counts(conn, &topic, now).await?;
    Ok(topic)
}

impl ThesisService {
    /// Publish a topic. Its capacity may not exceed what the supervisor's
    /// ledger for that track has left, but publishing consumes nothing.
    ///
    /// # Errors
    ///
    /// `NotFound` without a semester or ledger, `DeadlineExceeded` after the
    /// track's registration deadline, `SlotUnavailable` when `max_slots`
    /// exceeds the ledger's remaining capacity, `Validation` for an empty
    /// title or zero slots.
    pub async fn publish_topic(
        &self,
        supervisor: &Supervisor,
        new: NewTopic,
    ) -> Result<Topic, DatabaseError> {
        if new.title.trim().is_empty() {
            return Err(WorkflowError::Validation("topic title is empty".into()).into());
        }
        if new.max_slots == 0 {
            return Err(WorkflowError::Validation("topic needs at least one slot".into()).into());
        }
        let key = LedgerKey::new(supervisor.id(), &new.semester_id, new.track);
        let guards = self.locks().lock(LockKey::Ledger(key.clone())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .publish_in_tx(&tx, &mut outbox, supervisor, &key, new)
            .await;
        let topic = self.complete("publish_topic", guards, tx, outbox, result).await?;
        tracing::info!(topic_id = %topic.id, ledger = %key, max_slots = topic.max_slots, "topic published");
        Ok(topic)
    }

    async fn publish_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        supervisor: &Supervisor,
        key: &LedgerKey,
        new: NewTopic,
    ) -> Result<Topic, DatabaseError> {
        let now = self.clock().now();
        let semester = load_semester(conn, &new.semester_id).await?;
        self.clock()
            .ensure_before_deadline(&semester, new.track, Phase::Registration)?;
        let ledger = load_ledger(conn, key).await?;
        if new.max_slots > ledger.remaining() {
            return Err(WorkflowError::SlotUnavailable { key: key.clone() }.into());
        }

        let id = generate_id(conn, PREFIX_TOPIC).await?;
        conn.execute(
            &format!(
                "INSERT INTO topics ({SELECT_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'open', 0, ?8, ?8)"
            ),
            libsql::params![
                id.as_str(),
                supervisor.id(),
                new.semester_id.as_str(),
                new.track.as_str(),
                new.title.as_str(),
                new.description.as_deref(),
                i64::from(new.max_slots),
                fmt_datetime(&now)
            ],
        )
        .await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::TopicPublished,
                    subject_type: EntityType::Topic,
                    subject_id: &id,
                    actor_id: supervisor.actor_id(),
                    detail: Some(serde_json::json!({ "max_slots": new.max_slots })),
                },
                now,
            )
            .await?;

        Ok(Topic {
            id,
            supervisor_id: supervisor.id().to_string(),
            semester_id: new.semester_id,
            track: new.track,
            title: new.title,
            description: new.description,
            max_slots: new.max_slots,
            taken_slots: 0,
            status: TopicStatus::Open,
            withdrawn: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// # Errors
    ///
    /// `NotFound` if no topic has this id.
    pub async fn get_topic(&self, id: &str) -> Result<Topic, DatabaseError> {
        let conn = self.db().read().await?;
        load_topic(&conn, id).await
    }

    /// Topics of a semester, optionally restricted to one track.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_topics(
        &self,
        semester_id: &str,
        track: Option<Track>,
    ) -> Result<Vec<Topic>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {SELECT_COLS} FROM topics
                 WHERE semester_id = ?1 AND (?2 IS NULL OR track = ?2)
                 ORDER BY created_at, id"
            ),
            libsql::params![semester_id, track.map(Track::as_str)],
            row_to_topic,
        )
        .await
    }

    /// Close a topic to new applications. Pending and approved applications
    /// are left alone.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the caller owns the topic, `InvalidTransition`
    /// if it is already withdrawn.
    pub async fn withdraw_topic(
        &self,
        supervisor: &Supervisor,
        topic_id: &str,
    ) -> Result<Topic, DatabaseError> {
        let topic = self.get_topic(topic_id).await?;
        let key = LedgerKey::new(&topic.supervisor_id, &topic.semester_id, topic.track);
        let guards = self.locks().lock(LockKey::Ledger(key)).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self.withdraw_in_tx(&tx, &mut outbox, supervisor, topic_id).await;
        let topic = self.complete("withdraw_topic", guards, tx, outbox, result).await?;
        tracing::info!(%topic_id, "topic withdrawn");
        Ok(topic)
    }

    async fn withdraw_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        supervisor: &Supervisor,
        topic_id: &str,
    ) -> Result<Topic, DatabaseError> {
        let now = self.clock().now();
        let mut topic = load_topic(conn, topic_id).await?;
        if topic.supervisor_id != supervisor.id() {
            return Err(WorkflowError::unauthorized(
                supervisor.id(),
                format!("withdraw topic {topic_id}"),
            )
            .into());
        }
        if topic.withdrawn {
            return Err(WorkflowError::invalid_transition(
                EntityType::Topic,
                topic_id,
                "withdrawn",
                "withdrawn",
            )
            .into());
        }
        topic.withdrawn = true;
        topic.status = topic.derived_status();
        topic.updated_at = now;
        store_counts(conn, &topic, now).await?;

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::TopicWithdrawn,
                    subject_type: EntityType::Topic,
                    subject_id: topic_id,
                    actor_id: supervisor.actor_id(),
                    detail: None,
                },
                now,
            )
            .await?;
        Ok(topic)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use thesis_core::errors::ErrorKind;

    use super::*;
    use crate::test_support::helpers::*;

    fn new_topic(semester_id: &str, max_slots: u32) -> NewTopic {
        NewTopic {
            semester_id: semester_id.into(),
            track: Track::PreThesis,
            title: "Deterministic replay".into(),
            description: Some("Record and replay of async runtimes".into()),
            max_slots,
        }
    }

    #[tokio::test]
    async fn publish_bounded_by_ledger_remaining() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::PreThesis, 2).await;
        let sup = teacher("tch-1").supervisor().unwrap();

        let topic = env
            .service
            .publish_topic(&sup, new_topic(&sem.id, 2))
            .await
            .unwrap();
        assert_eq!(topic.status, TopicStatus::Open);
        assert_eq!(env.service.get_topic(&topic.id).await.unwrap(), topic);

        let err = env
            .service
            .publish_topic(&sup, new_topic(&sem.id, 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SlotUnavailable);

        // Publishing does not consume capacity.
        let ledger = env
            .service
            .get_ledger(&LedgerKey::new("tch-1", &sem.id, Track::PreThesis))
            .await
            .unwrap();
        assert_eq!(ledger.remaining(), 2);
    }

    #[tokio::test]
    async fn publish_without_ledger_is_not_found() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        let err = env
            .service
            .publish_topic(&teacher("tch-9").supervisor().unwrap(), new_topic(&sem.id, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn publish_after_registration_deadline_fails() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::PreThesis, 2).await;
        env.clock.set(sem.pre_thesis.registration + Duration::seconds(1));
        let err = env
            .service
            .publish_topic(&teacher("tch-1").supervisor().unwrap(), new_topic(&sem.id, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn take_and_release_track_status() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::PreThesis, 1).await;
        let topic = seed_topic(&env, &sem.id, "tch-1", Track::PreThesis, 1).await;
        let now = env.service.clock().now();

        let tx = env.service.db().begin().await.unwrap();
        let full = take_topic_slot(&tx, &topic.id, now).await.unwrap();
        assert_eq!(full.status, TopicStatus::Closed);
        let err = take_topic_slot(&tx, &topic.id, now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TopicClosed);
        let reopened = release_topic_slot(&tx, &topic.id, now).await.unwrap();
        assert_eq!(reopened.status, TopicStatus::Open);
        let err = release_topic_slot(&tx, &topic.id, now).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn withdraw_only_by_owner_and_once() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        seed_ledger(&env, &sem.id, "tch-1", Track::PreThesis, 3).await;
        let topic = seed_topic(&env, &sem.id, "tch-1", Track::PreThesis, 2).await;

        let err = env
            .service
            .withdraw_topic(&teacher("tch-2").supervisor().unwrap(), &topic.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let owner = teacher("tch-1").supervisor().unwrap();
        let withdrawn = env.service.withdraw_topic(&owner, &topic.id).await.unwrap();
        assert!(withdrawn.withdrawn);
        assert_eq!(withdrawn.status, TopicStatus::Closed);

        let err = env.service.withdraw_topic(&owner, &topic.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let listed = env
            .service
            .list_topics(&sem.id, Some(Track::PreThesis))
            .await
            .unwrap();
        assert_eq!(listed, vec![withdrawn]);
        assert!(env
            .service
            .list_topics(&sem.id, Some(Track::Thesis))
            .await
            .unwrap()
            .is_empty());
    }
}
