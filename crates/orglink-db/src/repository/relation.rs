//! SurrealDB implementation of [`RelationRepository`].

use chrono::{DateTime, Utc};
use orglink_core::error::OrgLinkResult;
use orglink_core::models::relation::{
    CreateRelation, Direction, OrganizationRelation, RelationPermissions, RelationStatus,
    SharedData, UpdateRelation,
};
use orglink_core::repository::{
    PaginatedResult, Pagination, RelationFilter, RelationRepository, UniquenessPolicy,
};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use crate::error::DbError;

/// Marker thrown inside the create transaction when the uniqueness
/// policy rejects the insert.
const DUPLICATE_MARKER: &str = "duplicate relation";

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct RelationRow {
    from_org_id: String,
    to_org_id: String,
    relation_type: String,
    data_share_type: String,
    status: String,
    approved_by_from_org: bool,
    approved_by_to_org: bool,
    shared_data: serde_json::Value,
    permissions: serde_json::Value,
    priority: String,
    notes: Option<String>,
    status_reason: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    access_count: u64,
    last_accessed_at: Option<DateTime<Utc>>,
    version: u64,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct RelationRowWithId {
    record_id: String,
    from_org_id: String,
    to_org_id: String,
    relation_type: String,
    data_share_type: String,
    status: String,
    approved_by_from_org: bool,
    approved_by_to_org: bool,
    shared_data: serde_json::Value,
    permissions: serde_json::Value,
    priority: String,
    notes: Option<String>,
    status_reason: Option<String>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    access_count: u64,
    last_accessed_at: Option<DateTime<Utc>>,
    version: u64,
}

fn decode<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, DbError> {
    raw.parse()
        .map_err(|_| DbError::Decode(format!("invalid {field}: {raw}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(
    field: &str,
    raw: serde_json::Value,
) -> Result<T, DbError> {
    serde_json::from_value(raw).map_err(|e| DbError::Decode(format!("invalid {field}: {e}")))
}

impl RelationRow {
    fn into_relation(self, id: Uuid) -> Result<OrganizationRelation, DbError> {
        Ok(OrganizationRelation {
            id,
            from_org_id: self.from_org_id,
            to_org_id: self.to_org_id,
            relation_type: decode("relation_type", &self.relation_type)?,
            data_share_type: decode("data_share_type", &self.data_share_type)?,
            status: decode("status", &self.status)?,
            approved_by_from_org: self.approved_by_from_org,
            approved_by_to_org: self.approved_by_to_org,
            shared_data: decode_json::<SharedData>("shared_data", self.shared_data)?,
            permissions: decode_json::<RelationPermissions>("permissions", self.permissions)?,
            priority: decode("priority", &self.priority)?,
            notes: self.notes,
            status_reason: self.status_reason,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            end_date: self.end_date,
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
            version: self.version,
        })
    }
}

impl RelationRowWithId {
    fn try_into_relation(self) -> Result<OrganizationRelation, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        RelationRow {
            from_org_id: self.from_org_id,
            to_org_id: self.to_org_id,
            relation_type: self.relation_type,
            data_share_type: self.data_share_type,
            status: self.status,
            approved_by_from_org: self.approved_by_from_org,
            approved_by_to_org: self.approved_by_to_org,
            shared_data: self.shared_data,
            permissions: self.permissions,
            priority: self.priority,
            notes: self.notes,
            status_reason: self.status_reason,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
            end_date: self.end_date,
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
            version: self.version,
        }
        .into_relation(id)
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn status_list(statuses: &[RelationStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SurrealDB implementation of the Relation repository.
#[derive(Clone)]
pub struct SurrealRelationRepository<C: Connection> {
    db: Surreal<C>,
    uniqueness: UniquenessPolicy,
}

impl<C: Connection> SurrealRelationRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            uniqueness: UniquenessPolicy::default(),
        }
    }

    pub fn with_uniqueness(db: Surreal<C>, uniqueness: UniquenessPolicy) -> Self {
        Self { db, uniqueness }
    }

    /// Build the WHERE clause for `filter`. Values are bound by the caller
    /// under `$org_id`, `$relation_type` and `$end_before`.
    fn where_clause(filter: &RelationFilter) -> String {
        let mut conds = Vec::new();
        if filter.org_id.is_some() {
            conds.push(match filter.direction {
                Some(Direction::Outgoing) => "from_org_id = $org_id".to_string(),
                Some(Direction::Incoming) => "to_org_id = $org_id".to_string(),
                None => "(from_org_id = $org_id OR to_org_id = $org_id)".to_string(),
            });
        }
        if !filter.statuses.is_empty() {
            // Status strings are fixed enum values, safe to inline.
            conds.push(format!("status IN [{}]", status_list(&filter.statuses)));
        }
        if filter.relation_type.is_some() {
            conds.push("relation_type = $relation_type".to_string());
        }
        if filter.end_date_before.is_some() {
            conds.push("end_date != NONE AND end_date <= $end_before".to_string());
        }
        if conds.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conds.join(" AND "))
        }
    }
}

impl<C: Connection> RelationRepository for SurrealRelationRepository<C> {
    async fn create(&self, input: CreateRelation) -> OrgLinkResult<OrganizationRelation> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let pair_key = format!(
            "{} -> {} ({})",
            input.from_org_id, input.to_org_id, input.relation_type
        );

        let shared_data = serde_json::to_value(&input.shared_data)
            .map_err(|e| DbError::Decode(e.to_string()))?;
        let permissions = serde_json::to_value(input.permissions)
            .map_err(|e| DbError::Decode(e.to_string()))?;

        let create = "CREATE type::record('relation', $id) SET \
             from_org_id = $from_org_id, to_org_id = $to_org_id, \
             relation_type = $relation_type, \
             data_share_type = $data_share_type, \
             status = 'PENDING', \
             approved_by_from_org = false, approved_by_to_org = false, \
             shared_data = $shared_data, permissions = $permissions, \
             priority = $priority, notes = $notes, \
             status_reason = NONE, created_by = $created_by, \
             end_date = $end_date, access_count = 0, \
             last_accessed_at = NONE, version = 0;";

        // The duplicate check and the insert run in one transaction so two
        // concurrent creates cannot both pass the check.
        let query = match self.uniqueness {
            UniquenessPolicy::AllowDuplicates => create.to_string(),
            UniquenessPolicy::PerRelationType => format!(
                "BEGIN TRANSACTION; \
                 IF count((SELECT id FROM relation \
                     WHERE from_org_id = $from_org_id \
                     AND to_org_id = $to_org_id \
                     AND relation_type = $relation_type \
                     AND status NOT IN ['EXPIRED', 'REVOKED'])) > 0 {{ \
                     THROW '{DUPLICATE_MARKER}'; \
                 }}; \
                 {create} \
                 COMMIT TRANSACTION;"
            ),
        };

        let result = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("from_org_id", input.from_org_id))
            .bind(("to_org_id", input.to_org_id))
            .bind(("relation_type", input.relation_type.as_str().to_string()))
            .bind(("data_share_type", input.data_share_type.as_str().to_string()))
            .bind(("shared_data", shared_data))
            .bind(("permissions", permissions))
            .bind(("priority", input.priority.as_str().to_string()))
            .bind(("notes", input.notes))
            .bind(("created_by", input.created_by))
            .bind(("end_date", input.end_date))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(|e| {
            if e.to_string().contains(DUPLICATE_MARKER) {
                warn!(pair = %pair_key, "Rejected duplicate relation");
                DbError::DuplicateRelation(pair_key.clone())
            } else {
                DbError::query(e)
            }
        })?;

        // Statement numbering differs between the plain and transactional
        // forms, so read the row back instead of indexing the response.
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> OrgLinkResult<OrganizationRelation> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('relation', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "relation".into(),
            id: id_str,
        })?;

        Ok(row.into_relation(id)?)
    }

    async fn list(
        &self,
        filter: RelationFilter,
        pagination: Pagination,
    ) -> OrgLinkResult<PaginatedResult<OrganizationRelation>> {
        let where_clause = Self::where_clause(&filter);
        let org_id = filter.org_id.clone().unwrap_or_default();
        let relation_type = filter
            .relation_type
            .map(|t| t.as_str().to_string())
            .unwrap_or_default();

        let mut count_result = self
            .db
            .query(format!(
                "SELECT count() AS total FROM relation {where_clause} GROUP ALL"
            ))
            .bind(("org_id", org_id.clone()))
            .bind(("relation_type", relation_type.clone()))
            .bind(("end_before", filter.end_date_before))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(format!(
                "SELECT meta::id(id) AS record_id, * FROM relation \
                 {where_clause} \
                 ORDER BY created_at DESC \
                 LIMIT $limit START $offset"
            ))
            .bind(("org_id", org_id))
            .bind(("relation_type", relation_type))
            .bind(("end_before", filter.end_date_before))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RelationRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(|row| row.try_into_relation())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        input: UpdateRelation,
    ) -> OrgLinkResult<OrganizationRelation> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.approved_by_from_org.is_some() {
            sets.push("approved_by_from_org = $approved_by_from_org");
        }
        if input.approved_by_to_org.is_some() {
            sets.push("approved_by_to_org = $approved_by_to_org");
        }
        if input.status_reason.is_some() {
            sets.push("status_reason = $status_reason");
        }
        sets.push("version += 1");
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('relation', $id) SET {} \
             WHERE version = $expected_version",
            sets.join(", ")
        );

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("expected_version", expected_version));

        if let Some(status) = input.status {
            builder = builder.bind(("status", status.as_str().to_string()));
        }
        if let Some(approved) = input.approved_by_from_org {
            builder = builder.bind(("approved_by_from_org", approved));
        }
        if let Some(approved) = input.approved_by_to_org {
            builder = builder.bind(("approved_by_to_org", approved));
        }
        if let Some(reason) = input.status_reason {
            builder = builder.bind(("status_reason", reason));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::query)?;

        let rows: Vec<RelationRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(row.into_relation(id)?),
            None => {
                // Either the record is gone or its version moved on.
                self.get_by_id(id).await?;
                Err(DbError::VersionConflict {
                    entity: "relation".into(),
                    id: id_str,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surrealdb::engine::local::Db;

    #[test]
    fn where_clause_is_empty_without_filters() {
        let clause = SurrealRelationRepository::<Db>::where_clause(&RelationFilter::default());
        assert!(clause.is_empty());
    }

    #[test]
    fn where_clause_respects_direction() {
        let filter = RelationFilter {
            org_id: Some("ORG_A".into()),
            direction: Some(Direction::Incoming),
            statuses: vec![RelationStatus::Pending, RelationStatus::Active],
            ..Default::default()
        };
        let clause = SurrealRelationRepository::<Db>::where_clause(&filter);
        assert!(clause.contains("to_org_id = $org_id"));
        assert!(!clause.contains("from_org_id"));
        assert!(clause.contains("status IN ['PENDING', 'ACTIVE']"));
    }
}
