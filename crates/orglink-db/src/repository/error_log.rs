//! SurrealDB implementation of [`ErrorLogRepository`].

use chrono::{DateTime, Utc};
use orglink_core::error::OrgLinkResult;
use orglink_core::models::analytics::{CreateErrorEvent, ErrorEvent};
use orglink_core::repository::ErrorLogRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct ErrorEventRowWithId {
    record_id: String,
    relation_id: String,
    description: String,
    attempts: u32,
    occurred_at: DateTime<Utc>,
}

impl ErrorEventRowWithId {
    fn try_into_event(self) -> Result<ErrorEvent, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        let relation_id = Uuid::parse_str(&self.relation_id)
            .map_err(|e| DbError::Decode(format!("invalid relation UUID: {e}")))?;
        Ok(ErrorEvent {
            id,
            relation_id,
            description: self.description,
            attempts: self.attempts,
            occurred_at: self.occurred_at,
        })
    }
}

/// SurrealDB implementation of the error log.
#[derive(Clone)]
pub struct SurrealErrorLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealErrorLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> ErrorLogRepository for SurrealErrorLogRepository<C> {
    async fn append(&self, input: CreateErrorEvent) -> OrgLinkResult<ErrorEvent> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        self.db
            .query(
                "CREATE type::record('error_event', $id) SET \
                 relation_id = $relation_id, description = $description, \
                 attempts = $attempts, occurred_at = $occurred_at",
            )
            .bind(("id", id_str))
            .bind(("relation_id", input.relation_id.to_string()))
            .bind(("description", input.description.clone()))
            .bind(("attempts", input.attempts))
            .bind(("occurred_at", input.occurred_at))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::query)?;

        Ok(ErrorEvent {
            id,
            relation_id: input.relation_id,
            description: input.description,
            attempts: input.attempts,
            occurred_at: input.occurred_at,
        })
    }

    async fn list_by_relation(
        &self,
        relation_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> OrgLinkResult<Vec<ErrorEvent>> {
        let window = if since.is_some() {
            "AND occurred_at >= $since"
        } else {
            ""
        };

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM error_event \
                 WHERE relation_id = $relation_id {window} \
                 ORDER BY occurred_at ASC"
            ))
            .bind(("relation_id", relation_id.to_string()))
            .bind(("since", since))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<ErrorEventRowWithId> = result.take(0).map_err(DbError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| row.try_into_event())
            .collect::<Result<Vec<_>, DbError>>()?)
    }
}
