//! SurrealDB implementation of [`AuditLogRepository`].

use chrono::{DateTime, Utc};
use orglink_core::error::OrgLinkResult;
use orglink_core::models::audit::{ActorKind, AuditLogEntry, CreateAuditLogEntry};
use orglink_core::models::relation::RelationStatus;
use orglink_core::repository::{AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct AuditRowWithId {
    record_id: String,
    relation_id: String,
    actor_id: String,
    actor_kind: String,
    action: String,
    from_status: Option<String>,
    to_status: Option<String>,
    reason: Option<String>,
    metadata: serde_json::Value,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_actor_kind(s: &str) -> Result<ActorKind, DbError> {
    match s {
        "user" => Ok(ActorKind::User),
        "system" => Ok(ActorKind::System),
        other => Err(DbError::Decode(format!("unknown actor kind: {other}"))),
    }
}

fn parse_status(raw: Option<String>) -> Result<Option<RelationStatus>, DbError> {
    raw.map(|s| {
        s.parse::<RelationStatus>()
            .map_err(|_| DbError::Decode(format!("unknown relation status: {s}")))
    })
    .transpose()
}

impl AuditRowWithId {
    fn try_into_entry(self) -> Result<AuditLogEntry, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        let relation_id = Uuid::parse_str(&self.relation_id)
            .map_err(|e| DbError::Decode(format!("invalid relation UUID: {e}")))?;
        Ok(AuditLogEntry {
            id,
            relation_id,
            actor_id: self.actor_id,
            actor_kind: parse_actor_kind(&self.actor_kind)?,
            action: self.action,
            from_status: parse_status(self.from_status)?,
            to_status: parse_status(self.to_status)?,
            reason: self.reason,
            metadata: self.metadata,
            timestamp: self.timestamp,
        })
    }
}

/// SurrealDB implementation of the append-only audit log.
#[derive(Clone)]
pub struct SurrealAuditLogRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAuditLogRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AuditLogRepository for SurrealAuditLogRepository<C> {
    async fn append(&self, input: CreateAuditLogEntry) -> OrgLinkResult<AuditLogEntry> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));

        let result = self
            .db
            .query(
                "CREATE type::record('audit_log', $id) SET \
                 relation_id = $relation_id, actor_id = $actor_id, \
                 actor_kind = $actor_kind, action = $action, \
                 from_status = $from_status, to_status = $to_status, \
                 reason = $reason, metadata = $metadata; \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('audit_log', $id);",
            )
            .bind(("id", id_str.clone()))
            .bind(("relation_id", input.relation_id.to_string()))
            .bind(("actor_id", input.actor.id))
            .bind(("actor_kind", input.actor.kind.as_str().to_string()))
            .bind(("action", input.action))
            .bind((
                "from_status",
                input.from_status.map(|s| s.as_str().to_string()),
            ))
            .bind(("to_status", input.to_status.map(|s| s.as_str().to_string())))
            .bind(("reason", input.reason))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::query)?;

        let rows: Vec<AuditRowWithId> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "audit_log".into(),
            id: id_str,
        })?;

        Ok(row.try_into_entry()?)
    }

    async fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> OrgLinkResult<PaginatedResult<AuditLogEntry>> {
        let mut conds = Vec::new();
        if filter.relation_id.is_some() {
            conds.push("relation_id = $relation_id");
        }
        if filter.actor_id.is_some() {
            conds.push("actor_id = $actor_id");
        }
        if filter.action.is_some() {
            conds.push("action = $action");
        }
        if filter.from.is_some() {
            conds.push("timestamp >= $from");
        }
        if filter.to.is_some() {
            conds.push("timestamp <= $to");
        }
        let where_clause = if conds.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conds.join(" AND "))
        };

        let relation_id = filter.relation_id.map(|id| id.to_string());

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM audit_log {where_clause} GROUP ALL"
            ))
            .bind(("relation_id", relation_id.clone()))
            .bind(("actor_id", filter.actor_id.clone()))
            .bind(("action", filter.action.clone()))
            .bind(("from", filter.from))
            .bind(("to", filter.to))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM audit_log \
                 {where_clause} \
                 ORDER BY timestamp DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("relation_id", relation_id))
            .bind(("actor_id", filter.actor_id))
            .bind(("action", filter.action))
            .bind(("from", filter.from))
            .bind(("to", filter.to))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AuditRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_entry())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
