//! SurrealDB implementation of [`AccessLogRepository`].

use chrono::{DateTime, Utc};
use orglink_core::error::OrgLinkResult;
use orglink_core::models::analytics::{AccessEvent, CreateAccessEvent};
use orglink_core::repository::AccessLogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AccessEventRow {
    relation_id: String,
    action: String,
    success: bool,
    response_time_ms: u64,
    data_type: String,
    occurred_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AccessEventRowWithId {
    record_id: String,
    relation_id: String,
    action: String,
    success: bool,
    response_time_ms: u64,
    data_type: String,
    occurred_at: DateTime<Utc>,
}

impl AccessEventRow {
    fn into_event(self, id: Uuid) -> Result<AccessEvent, DbError> {
        let relation_id = Uuid::parse_str(&self.relation_id)
            .map_err(|e| DbError::Decode(format!("invalid relation UUID: {e}")))?;
        Ok(AccessEvent {
            id,
            relation_id,
            action: self.action,
            success: self.success,
            response_time_ms: self.response_time_ms,
            data_type: self.data_type,
            occurred_at: self.occurred_at,
        })
    }
}

impl AccessEventRowWithId {
    fn try_into_event(self) -> Result<AccessEvent, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        AccessEventRow {
            relation_id: self.relation_id,
            action: self.action,
            success: self.success,
            response_time_ms: self.response_time_ms,
            data_type: self.data_type,
            occurred_at: self.occurred_at,
        }
        .into_event(id)
    }
}

/// SurrealDB implementation of the access log.
#[derive(Clone)]
pub struct SurrealAccessLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccessLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccessLogRepository for SurrealAccessLogRepository<C> {
    async fn append(&self, input: CreateAccessEvent) -> OrgLinkResult<AccessEvent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        // The event and the relation counters commit together. A relation
        // that does not exist is left untouched.
        let result = self
            .db
            .query(
                "BEGIN TRANSACTION; \
                 CREATE type::record('access_event', $id) SET \
                     relation_id = $relation_id, action = $action, \
                     success = $success, response_time_ms = $response_time_ms, \
                     data_type = $data_type, occurred_at = $occurred_at; \
                 UPDATE type::record('relation', $relation_id) SET access_count += 1; \
                 UPDATE type::record('relation', $relation_id) \
                     SET last_accessed_at = $occurred_at \
                     WHERE last_accessed_at = NONE OR last_accessed_at < $occurred_at; \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id_str.clone()))
            .bind(("relation_id", input.relation_id.to_string()))
            .bind(("action", input.action))
            .bind(("success", input.success))
            .bind(("response_time_ms", input.response_time_ms))
            .bind(("data_type", input.data_type))
            .bind(("occurred_at", input.occurred_at))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(DbError::query)?;

        let rows: Vec<AccessEventRow> = self
            .db
            .query("SELECT * FROM type::record('access_event', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?
            .take(0)
            .map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "access_event".into(),
            id: id_str,
        })?;

        Ok(row.into_event(id)?)
    }

    async fn list_by_relation(
        &self,
        relation_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> OrgLinkResult<Vec<AccessEvent>> {
        let window = if since.is_some() {
            "AND occurred_at >= $since"
        } else {
            ""
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM access_event \
                 WHERE relation_id = $relation_id {window} \
                 ORDER BY occurred_at ASC"
            ))
            .bind(("relation_id", relation_id.to_string()))
            .bind(("since", since))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccessEventRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
