//! Capacity ledger persistence.
//!
//! Arithmetic lives in [`SupervisionLedger`]; this module loads a ledger,
//! applies one operation to a copy, and writes it back with a
//! compare-and-set on the previous counts. A lost update is therefore
//! impossible even if a caller forgot its key lock: the write would match no
//! row and surface as `InvariantViolation`.

use chrono::{DateTime, Utc};
use thesis_core::enums::{EntityType, EventType, Track};
use thesis_core::errors::WorkflowError;
use thesis_core::identity::{Administrator, Capability};
use thesis_core::ledger::{LedgerKey, SlotPool, SupervisionLedger};

use crate::error::DatabaseError;
use crate::events::{EventDraft, Outbox};
use crate::helpers::{fmt_datetime, get_u32, parse_datetime, parse_enum, query_all, query_opt};
use crate::locks::LockKey;
use crate::service::ThesisService;

use super::semester::load_semester;

const SELECT_COLS: &str =
    "supervisor_id, semester_id, track, max_slots, reserved_slots, confirmed_slots, updated_at";

fn row_to_ledger(row: &libsql::Row) -> Result<SupervisionLedger, DatabaseError> {
    Ok(SupervisionLedger {
        key: LedgerKey {
            supervisor_id: row.get(0)?,
            semester_id: row.get(1)?,
            track: parse_enum(&row.get::<String>(2)?)?,
        },
        max_slots: get_u32(row, 3)?,
        reserved_slots: get_u32(row, 4)?,
        confirmed_slots: get_u32(row, 5)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

async fn find_ledger(
    conn: &libsql::Connection,
    key: &LedgerKey,
) -> Result<Option<SupervisionLedger>, DatabaseError> {
    query_opt(
        conn,
        &format!(
            "SELECT {SELECT_COLS} FROM ledgers
             WHERE supervisor_id = ?1 AND semester_id = ?2 AND track = ?3"
        ),
        libsql::params![
            key.supervisor_id.as_str(),
            key.semester_id.as_str(),
            key.track.as_str()
        ],
        row_to_ledger,
    )
    .await
}

/// Load a ledger inside the caller's transaction.
pub(crate) async fn load_ledger(
    conn: &libsql::Connection,
    key: &LedgerKey,
) -> Result<SupervisionLedger, DatabaseError> {
    find_ledger(conn, key)
        .await?
        .ok_or_else(|| WorkflowError::not_found(EntityType::Ledger, key.to_string()).into())
}

/// Write `after` over the row still holding `before`'s counts.
async fn store_ledger(
    conn: &libsql::Connection,
    before: &SupervisionLedger,
    after: &SupervisionLedger,
) -> Result<(), DatabaseError> {
    let changed = conn
        .execute(
            "UPDATE ledgers
             SET max_slots = ?1, reserved_slots = ?2, confirmed_slots = ?3, updated_at = ?4
             WHERE supervisor_id = ?5 AND semester_id = ?6 AND track = ?7
               AND max_slots = ?8 AND reserved_slots = ?9 AND confirmed_slots = ?10",
            libsql::params![
                i64::from(after.max_slots),
                i64::from(after.reserved_slots),
                i64::from(after.confirmed_slots),
                fmt_datetime(&after.updated_at),
                before.key.supervisor_id.as_str(),
                before.key.semester_id.as_str(),
                before.key.track.as_str(),
                i64::from(before.max_slots),
                i64::from(before.reserved_slots),
                i64::from(before.confirmed_slots)
            ],
        )
        .await?;
    if changed != 1 {
        let error = WorkflowError::InvariantViolation(format!(
            "ledger {} changed underneath a locked update",
            before.key
        ));
        tracing::error!(ledger = %before.key, %error, "ledger compare-and-set missed");
        return Err(error.into());
    }
    Ok(())
}

/// One ledger movement, as applied by the workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotOp {
    Reserve,
    Confirm,
    /// Reserve and confirm in one step, for direct assignment.
    Allocate,
    Release(SlotPool),
}

/// Load, apply `op` for one slot, and write back.
///
/// # Errors
///
/// `NotFound` without a ledger, `SlotUnavailable` on exhaustion,
/// `InvariantViolation` when the counts do not allow the move.
pub(crate) async fn move_slot(
    conn: &libsql::Connection,
    key: &LedgerKey,
    op: SlotOp,
    now: DateTime<Utc>,
) -> Result<SupervisionLedger, DatabaseError> {
    let before = load_ledger(conn, key).await?;
    let mut after = before.clone();
    let applied = match op {
        SlotOp::Reserve => after.reserve(1),
        SlotOp::Confirm => after.confirm(1),
        SlotOp::Allocate => after.reserve(1).and_then(|()| after.confirm(1)),
        SlotOp::Release(pool) => after.release(1, pool),
    };
    if let Err(error) = applied {
        if matches!(error, WorkflowError::InvariantViolation(_)) {
            tracing::error!(ledger = %key, ?op, ledger_state = ?before, %error, "ledger invariant violated");
        }
        return Err(error.into());
    }
    after.updated_at = now;
    store_ledger(conn, &before, &after).await?;
    tracing::debug!(
        ledger = %key,
        ?op,
        reserved = after.reserved_slots,
        confirmed = after.confirmed_slots,
        remaining = after.remaining(),
        "ledger moved"
    );
    Ok(after)
}

impl ThesisService {
    /// Create a ledger, or resize an existing one.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown semester, `Validation` when shrinking below
    /// the slots already held.
    pub async fn provision_ledger(
        &self,
        admin: &Administrator,
        key: LedgerKey,
        max_slots: u32,
    ) -> Result<SupervisionLedger, DatabaseError> {
        let guards = self.locks().lock(LockKey::Ledger(key.clone())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self
            .provision_in_tx(&tx, &mut outbox, admin, &key, max_slots)
            .await;
        let ledger = self.complete("provision_ledger", guards, tx, outbox, result).await?;
        tracing::info!(ledger = %key, max_slots, "ledger provisioned");
        Ok(ledger)
    }

    async fn provision_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        key: &LedgerKey,
        max_slots: u32,
    ) -> Result<SupervisionLedger, DatabaseError> {
        let now = self.clock().now();
        load_semester(conn, &key.semester_id).await?;

        let (ledger, previous) = match find_ledger(conn, key).await? {
            Some(before) => {
                let mut after = before.clone();
                after.resize(max_slots)?;
                after.updated_at = now;
                store_ledger(conn, &before, &after).await?;
                (after, Some(before.max_slots))
            }
            None => {
                let ledger = SupervisionLedger::new(key.clone(), max_slots, now);
                conn.execute(
                    &format!(
                        "INSERT INTO ledgers ({SELECT_COLS}) VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)"
                    ),
                    libsql::params![
                        key.supervisor_id.as_str(),
                        key.semester_id.as_str(),
                        key.track.as_str(),
                        i64::from(max_slots),
                        fmt_datetime(&now)
                    ],
                )
                .await?;
                (ledger, None)
            }
        };

        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::LedgerProvisioned,
                    subject_type: EntityType::Ledger,
                    subject_id: &key.to_string(),
                    actor_id: admin.actor_id(),
                    detail: Some(serde_json::json!({
                        "max_slots": max_slots,
                        "previous_max_slots": previous,
                    })),
                },
                now,
            )
            .await?;
        Ok(ledger)
    }

    /// # Errors
    ///
    /// `NotFound` if the ledger was never provisioned.
    pub async fn get_ledger(&self, key: &LedgerKey) -> Result<SupervisionLedger, DatabaseError> {
        let conn = self.db().read().await?;
        load_ledger(&conn, key).await
    }

    /// Ledgers of a semester, optionally restricted to one track.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_ledgers(
        &self,
        semester_id: &str,
        track: Option<Track>,
    ) -> Result<Vec<SupervisionLedger>, DatabaseError> {
        let conn = self.db().read().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {SELECT_COLS} FROM ledgers
                 WHERE semester_id = ?1 AND (?2 IS NULL OR track = ?2)
                 ORDER BY supervisor_id, track"
            ),
            libsql::params![semester_id, track.map(Track::as_str)],
            row_to_ledger,
        )
        .await
    }

    /// Remove an empty ledger.
    ///
    /// # Errors
    ///
    /// `Validation` while any slot is reserved or confirmed.
    pub async fn delete_ledger(
        &self,
        admin: &Administrator,
        key: &LedgerKey,
    ) -> Result<(), DatabaseError> {
        let guards = self.locks().lock(LockKey::Ledger(key.clone())).await;
        let tx = self.db().begin().await?;
        let mut outbox = Outbox::new();
        let result = self.delete_ledger_in_tx(&tx, &mut outbox, admin, key).await;
        self.complete("delete_ledger", guards, tx, outbox, result).await?;
        tracing::info!(ledger = %key, "ledger deleted");
        Ok(())
    }

    async fn delete_ledger_in_tx(
        &self,
        conn: &libsql::Connection,
        outbox: &mut Outbox,
        admin: &Administrator,
        key: &LedgerKey,
    ) -> Result<(), DatabaseError> {
        let now = self.clock().now();
        let ledger = load_ledger(conn, key).await?;
        if ledger.allocated() > 0 {
            return Err(WorkflowError::Validation(format!(
                "ledger {key} still holds {} reserved and {} confirmed slots",
                ledger.reserved_slots, ledger.confirmed_slots
            ))
            .into());
        }
        conn.execute(
            "DELETE FROM ledgers WHERE supervisor_id = ?1 AND semester_id = ?2 AND track = ?3",
            libsql::params![
                key.supervisor_id.as_str(),
                key.semester_id.as_str(),
                key.track.as_str()
            ],
        )
        .await?;
        outbox
            .record(
                conn,
                EventDraft {
                    event_type: EventType::LedgerDeleted,
                    subject_type: EntityType::Ledger,
                    subject_id: &key.to_string(),
                    actor_id: admin.actor_id(),
                    detail: None,
                },
                now,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use thesis_core::errors::ErrorKind;

    use super::*;
    use crate::test_support::helpers::*;

    #[tokio::test]
    async fn provision_creates_then_resizes() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        let created = seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 2).await;
        assert_eq!(created.remaining(), 2);

        let resized = seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 5).await;
        assert_eq!(resized.max_slots, 5);
        assert_eq!(env.service.get_ledger(&created.key).await.unwrap(), resized);
        assert_eq!(
            env.service.list_ledgers(&sem.id, None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn provision_for_unknown_semester_is_not_found() {
        let env = test_env().await;
        let err = env
            .service
            .provision_ledger(
                &admin().administrator().unwrap(),
                LedgerKey::new("tch-1", "sem-nope", Track::Thesis),
                1,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn move_slot_keeps_counts_and_rejects_exhaustion() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        let ledger = seed_ledger(&env, &sem.id, "tch-1", Track::PreThesis, 1).await;
        let now = env.service.clock().now();

        let tx = env.service.db().begin().await.unwrap();
        let after = move_slot(&tx, &ledger.key, SlotOp::Reserve, now).await.unwrap();
        assert_eq!(after.reserved_slots, 1);
        let err = move_slot(&tx, &ledger.key, SlotOp::Reserve, now)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SlotUnavailable);
        let after = move_slot(&tx, &ledger.key, SlotOp::Confirm, now).await.unwrap();
        assert_eq!((after.reserved_slots, after.confirmed_slots), (0, 1));
        let err = move_slot(&tx, &ledger.key, SlotOp::Release(SlotPool::Reserved), now)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        tx.commit().await.unwrap();

        let stored = env.service.get_ledger(&ledger.key).await.unwrap();
        assert_eq!((stored.reserved_slots, stored.confirmed_slots), (0, 1));
    }

    #[tokio::test]
    async fn shrink_below_allocated_and_delete_while_held_fail() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        let ledger = seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 2).await;
        let admin = admin().administrator().unwrap();

        let tx = env.service.db().begin().await.unwrap();
        move_slot(&tx, &ledger.key, SlotOp::Allocate, env.service.clock().now())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = env
            .service
            .provision_ledger(&admin, ledger.key.clone(), 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = env
            .service
            .delete_ledger(&admin, &ledger.key)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn delete_empty_ledger() {
        let env = test_env().await;
        let sem = seed_semester(&env).await;
        let ledger = seed_ledger(&env, &sem.id, "tch-1", Track::Thesis, 2).await;
        env.service
            .delete_ledger(&admin().administrator().unwrap(), &ledger.key)
            .await
            .unwrap();
        let err = env.service.get_ledger(&ledger.key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(env.events.types().last(), Some(&EventType::LedgerDeleted));
    }
}
