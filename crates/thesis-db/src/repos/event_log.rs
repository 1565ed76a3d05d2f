//! Read side of the durable event log.

use chrono::{DateTime, Utc};
use thesis_core::entities::DomainEvent;
use thesis_core::enums::{EntityType, EventType};

use crate::error::DatabaseError;
use crate::helpers::{fmt_datetime, parse_datetime, parse_enum, parse_optional_json, query_all};
use crate::service::ThesisService;

/// Default page size for [`ThesisService::query_events`].
const DEFAULT_LIMIT: u32 = 100;

fn row_to_event(row: &libsql::Row) -> Result<DomainEvent, DatabaseError> {
    Ok(DomainEvent {
        id: row.get(0)?,
        event_type: parse_enum(&row.get::<String>(1)?)?,
        subject_type: parse_enum(&row.get::<String>(2)?)?,
        subject_id: row.get(3)?,
        actor_id: row.get(4)?,
        detail: parse_optional_json(row.get::<Option<String>>(5)?.as_deref())?,
        timestamp: parse_datetime(&row.get::<String>(6)?)?,
    })
}

/// Filter for event log queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub subject_type: Option<EntityType>,
    pub subject_id: Option<String>,
    pub event_type: Option<EventType>,
    pub actor_id: Option<String>,
    /// Events at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl ThesisService {
    /// Committed events in the order they were recorded.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn query_events(
        &self,
        filter: &EventFilter,
    ) -> Result<Vec<DomainEvent>, DatabaseError> {
        let mut sql = String::from(
            "SELECT id, event_type, subject_type, subject_id, actor_id, detail, created_at
             FROM event_log WHERE 1=1",
        );
        let mut params: Vec<libsql::Value> = Vec::new();

        if let Some(subject_type) = filter.subject_type {
            params.push(subject_type.as_str().into());
            sql.push_str(&format!(" AND subject_type = ?{}", params.len()));
        }
        if let Some(subject_id) = &filter.subject_id {
            params.push(subject_id.clone().into());
            sql.push_str(&format!(" AND subject_id = ?{}", params.len()));
        }
        if let Some(event_type) = filter.event_type {
            params.push(event_type.as_str().into());
            sql.push_str(&format!(" AND event_type = ?{}", params.len()));
        }
        if let Some(actor_id) = &filter.actor_id {
            params.push(actor_id.clone().into());
            sql.push_str(&format!(" AND actor_id = ?{}", params.len()));
        }
        if let Some(since) = &filter.since {
            params.push(fmt_datetime(since).into());
            sql.push_str(&format!(" AND created_at >= ?{}", params.len()));
        }
        params.push(i64::from(filter.limit.unwrap_or(DEFAULT_LIMIT)).into());
        sql.push_str(&format!(" ORDER BY created_at, rowid LIMIT ?{}", params.len()));

        let conn = self.db().read().await?;
        query_all(&conn, &sql, libsql::params_from_iter(params), row_to_event).await
    }
}
