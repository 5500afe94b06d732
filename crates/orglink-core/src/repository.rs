//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Relation writes that touch
//! status or consent flags go through [`RelationRepository::update`],
//! which is a compare-and-set on the relation version.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OrgLinkResult;
use crate::models::{
    analytics::{AccessEvent, CreateAccessEvent, CreateErrorEvent, ErrorEvent},
    audit::{AuditLogEntry, CreateAuditLogEntry},
    relation::{
        CreateRelation, Direction, OrganizationRelation, RelationStatus, RelationType,
        UpdateRelation,
    },
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Store-level duplicate policy on `(from_org_id, to_org_id, relation_type)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UniquenessPolicy {
    /// Any number of relations may exist for the same pair and type.
    #[default]
    AllowDuplicates,
    /// At most one non-terminal relation per pair and type.
    PerRelationType,
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Query filters for relations.
#[derive(Debug, Clone, Default)]
pub struct RelationFilter {
    /// Relations where this organization is either party.
    pub org_id: Option<String>,
    /// Narrows `org_id` to one side. Ignored without `org_id`.
    pub direction: Option<Direction>,
    pub statuses: Vec<RelationStatus>,
    pub relation_type: Option<RelationType>,
    /// Only relations whose `end_date` is at or before this instant.
    pub end_date_before: Option<DateTime<Utc>>,
}

pub trait RelationRepository: Send + Sync {
    /// Persist a new relation in `Pending` with both consent flags unset.
    ///
    /// Fails with `Conflict` when the configured [`UniquenessPolicy`]
    /// forbids another relation for the same pair and type.
    fn create(
        &self,
        input: CreateRelation,
    ) -> impl Future<Output = OrgLinkResult<OrganizationRelation>> + Send;
    fn get_by_id(&self, id: Uuid)
    -> impl Future<Output = OrgLinkResult<OrganizationRelation>> + Send;
    fn list(
        &self,
        filter: RelationFilter,
        pagination: Pagination,
    ) -> impl Future<Output = OrgLinkResult<PaginatedResult<OrganizationRelation>>> + Send;
    /// Apply `input` only if the stored version still equals
    /// `expected_version`. Bumps the version on success; fails with
    /// `Conflict` if another writer got there first.
    fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        input: UpdateRelation,
    ) -> impl Future<Output = OrgLinkResult<OrganizationRelation>> + Send;
}

// ---------------------------------------------------------------------------
// Analytics (append-only)
// ---------------------------------------------------------------------------

pub trait AccessLogRepository: Send + Sync {
    /// Append a new access event and, in the same transaction, increment
    /// the relation's `access_count` and advance its `last_accessed_at`.
    /// The timestamp never moves backwards. No update or delete
    /// operations exist.
    fn append(
        &self,
        input: CreateAccessEvent,
    ) -> impl Future<Output = OrgLinkResult<AccessEvent>> + Send;
    /// Events for a relation, optionally only those at or after `since`,
    /// ordered by `occurred_at` ascending.
    fn list_by_relation(
        &self,
        relation_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = OrgLinkResult<Vec<AccessEvent>>> + Send;
}

pub trait ErrorLogRepository: Send + Sync {
    fn append(
        &self,
        input: CreateErrorEvent,
    ) -> impl Future<Output = OrgLinkResult<ErrorEvent>> + Send;
    fn list_by_relation(
        &self,
        relation_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = OrgLinkResult<Vec<ErrorEvent>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub relation_id: Option<Uuid>,
    pub actor_id: Option<String>,
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append a new audit log entry. No update or delete operations exist.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = OrgLinkResult<AuditLogEntry>> + Send;
    /// Newest entries first.
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = OrgLinkResult<PaginatedResult<AuditLogEntry>>> + Send;
}
