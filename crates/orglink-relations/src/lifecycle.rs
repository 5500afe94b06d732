//! Relation lifecycle: creation, approval and status transitions.
//!
//! This manager is the only writer of `status` and the two approval
//! flags. Every write is a compare-and-set on the relation version,
//! additionally serialised per relation id inside the process. Different
//! relations never contend.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use orglink_core::error::{OrgLinkError, OrgLinkResult};
use orglink_core::external::{NotificationService, OrganizationDirectory};
use orglink_core::models::audit::{Actor, AuditLogEntry, CreateAuditLogEntry};
use orglink_core::models::notification::{RelationEvent, RelationEventKind};
use orglink_core::models::relation::{
    Action, CreateRelation, CreateRelationRequest, Direction, OrganizationRelation,
    RelationStatus, UpdateRelation,
};
use orglink_core::repository::{
    AuditLogFilter, AuditLogRepository, PaginatedResult, Pagination, RelationFilter,
    RelationRepository,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::approval::ApprovalCoordinator;
use crate::config::RelationConfig;
use crate::error::RelationError;
use crate::scope::{EffectiveScope, PermissionScopeResolver};
use crate::transition;

/// Statuses that still accept transitions.
const LIVE_STATUSES: [RelationStatus; 3] = [
    RelationStatus::Pending,
    RelationStatus::Active,
    RelationStatus::Suspended,
];

const SCAN_PAGE: u64 = 200;

/// Per-organization relation counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationOverview {
    pub org_id: String,
    pub total: u64,
    pub outgoing: u64,
    pub incoming: u64,
    pub by_status: BTreeMap<String, u64>,
    /// Pending relations still waiting for this organization's approval.
    pub awaiting_approval: u64,
}

enum Mutation {
    Unchanged(OrganizationRelation),
    Applied {
        before: OrganizationRelation,
        after: OrganizationRelation,
    },
}

/// Relation lifecycle service.
///
/// Generic over repository implementations so that the relation layer
/// has no dependency on the database crate.
pub struct RelationLifecycleManager<
    R: RelationRepository,
    A: AuditLogRepository,
    D: OrganizationDirectory,
> {
    relations: R,
    audit: A,
    directory: D,
    notifier: Arc<dyn NotificationService>,
    config: RelationConfig,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl<R: RelationRepository, A: AuditLogRepository, D: OrganizationDirectory>
    RelationLifecycleManager<R, A, D>
{
    pub fn new(
        relations: R,
        audit: A,
        directory: D,
        notifier: Arc<dyn NotificationService>,
        config: RelationConfig,
    ) -> Self {
        Self {
            relations,
            audit,
            directory,
            notifier,
            config,
            locks: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RelationConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    // -------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------

    /// Validate `request` and persist a new relation in `Pending`.
    ///
    /// Neither side is approved at creation; both parties must call
    /// [`approve`](Self::approve) explicitly.
    pub async fn create(
        &self,
        request: CreateRelationRequest,
        actor: &Actor,
    ) -> OrgLinkResult<OrganizationRelation> {
        let input = validate_create(request, actor, Utc::now())?;

        for org_id in [&input.from_org_id, &input.to_org_id] {
            if !self.directory.contains(org_id).await? {
                return Err(RelationError::UnknownOrganization(org_id.clone()).into());
            }
        }

        let relation = self.relations.create(input).await?;
        info!(
            relation_id = %relation.id,
            from_org_id = %relation.from_org_id,
            to_org_id = %relation.to_org_id,
            relation_type = %relation.relation_type,
            "Relation created"
        );

        self.record(
            "relation.create",
            RelationEventKind::Created,
            actor,
            None,
            &relation,
            None,
        )
        .await;
        Ok(relation)
    }

    /// Record `org_id`'s consent. The relation becomes `Active` in the
    /// same write that sets the second flag.
    ///
    /// A repeated approval from the same side returns the relation
    /// unchanged.
    pub async fn approve(
        &self,
        relation_id: Uuid,
        org_id: &str,
        actor: &Actor,
    ) -> OrgLinkResult<OrganizationRelation> {
        let outcome = self
            .mutate(relation_id, |current| plan_approval(current, org_id))
            .await;

        let (before, after) = match outcome {
            Ok(Mutation::Applied { before, after }) => (before, after),
            Ok(Mutation::Unchanged(current)) => {
                info!(relation_id = %relation_id, org_id, "Approval already recorded");
                return Ok(current);
            }
            Err(err) => {
                warn!(relation_id = %relation_id, org_id, error = %err, "Approval rejected");
                return Err(err);
            }
        };

        let kind = if after.status == RelationStatus::Active {
            info!(relation_id = %relation_id, org_id, "Relation activated");
            RelationEventKind::Activated
        } else {
            info!(relation_id = %relation_id, org_id, "Approval recorded");
            RelationEventKind::Approved
        };
        let direction = ApprovalCoordinator::direction(&after, org_id);
        self.record(
            "relation.approve",
            kind,
            actor,
            Some(before.status),
            &after,
            Some(serde_json::json!({ "orgId": org_id, "direction": direction })),
        )
        .await;
        Ok(after)
    }

    /// Move a relation to `status` following the transition table.
    pub async fn set_status(
        &self,
        relation_id: Uuid,
        status: RelationStatus,
        reason: Option<&str>,
        actor: &Actor,
    ) -> OrgLinkResult<OrganizationRelation> {
        self.transition_at(relation_id, status, reason, actor, Utc::now())
            .await
    }

    /// Expire every live relation whose end date is at or before `now`.
    /// Returns the ids that were expired; individual failures are logged
    /// and skipped.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> OrgLinkResult<Vec<Uuid>> {
        let due = self
            .collect(RelationFilter {
                statuses: LIVE_STATUSES.to_vec(),
                end_date_before: Some(now),
                ..Default::default()
            })
            .await?;

        let system = Actor::system();
        let mut expired = Vec::with_capacity(due.len());
        for relation in due {
            match self
                .transition_at(
                    relation.id,
                    RelationStatus::Expired,
                    Some("end date reached"),
                    &system,
                    now,
                )
                .await
            {
                Ok(_) => expired.push(relation.id),
                Err(err) => {
                    warn!(relation_id = %relation.id, error = %err, "Could not expire relation");
                }
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired overdue relations");
        }
        Ok(expired)
    }

    async fn transition_at(
        &self,
        relation_id: Uuid,
        status: RelationStatus,
        reason: Option<&str>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> OrgLinkResult<OrganizationRelation> {
        let outcome = self
            .mutate(relation_id, |current| {
                transition::plan_status_change(current, status, reason, actor, now).map(Some)
            })
            .await;

        let (before, after) = match outcome {
            Ok(Mutation::Applied { before, after }) => (before, after),
            Ok(Mutation::Unchanged(current)) => return Ok(current),
            Err(err) => {
                warn!(
                    relation_id = %relation_id,
                    requested = %status,
                    error = %err,
                    "Status change rejected"
                );
                return Err(err);
            }
        };

        info!(
            relation_id = %relation_id,
            from = %before.status,
            to = %after.status,
            actor = %actor.id,
            "Relation status changed"
        );
        self.record(
            "relation.status",
            RelationEventKind::StatusChanged,
            actor,
            Some(before.status),
            &after,
            None,
        )
        .await;
        Ok(after)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    pub async fn get(&self, relation_id: Uuid) -> OrgLinkResult<OrganizationRelation> {
        self.relations.get_by_id(relation_id).await
    }

    pub async fn list(
        &self,
        filter: RelationFilter,
        pagination: Pagination,
    ) -> OrgLinkResult<PaginatedResult<OrganizationRelation>> {
        self.relations.list(filter, pagination).await
    }

    /// Pending relations where `org_id` is a party that has not approved.
    pub async fn pending_approvals(&self, org_id: &str) -> OrgLinkResult<Vec<OrganizationRelation>> {
        let pending = self
            .collect(RelationFilter {
                org_id: Some(org_id.to_string()),
                statuses: vec![RelationStatus::Pending],
                ..Default::default()
            })
            .await?;
        Ok(pending
            .into_iter()
            .filter(|r| ApprovalCoordinator::awaits(r, org_id))
            .collect())
    }

    pub async fn overview(&self, org_id: &str) -> OrgLinkResult<RelationOverview> {
        let count = |filter: RelationFilter| async move {
            self.relations
                .list(filter, Pagination { offset: 0, limit: 1 })
                .await
                .map(|page| page.total)
        };
        let for_org = || RelationFilter {
            org_id: Some(org_id.to_string()),
            ..Default::default()
        };

        let total = count(for_org()).await?;
        let outgoing = count(RelationFilter {
            direction: Some(Direction::Outgoing),
            ..for_org()
        })
        .await?;
        let incoming = count(RelationFilter {
            direction: Some(Direction::Incoming),
            ..for_org()
        })
        .await?;

        let mut by_status = BTreeMap::new();
        for status in LIVE_STATUSES
            .into_iter()
            .chain([RelationStatus::Expired, RelationStatus::Revoked])
        {
            let n = count(RelationFilter {
                statuses: vec![status],
                ..for_org()
            })
            .await?;
            by_status.insert(status.as_str().to_string(), n);
        }

        let awaiting_approval = self.pending_approvals(org_id).await?.len() as u64;

        Ok(RelationOverview {
            org_id: org_id.to_string(),
            total,
            outgoing,
            incoming,
            by_status,
            awaiting_approval,
        })
    }

    pub async fn effective_scope(&self, relation_id: Uuid) -> OrgLinkResult<EffectiveScope> {
        let relation = self.relations.get_by_id(relation_id).await?;
        Ok(PermissionScopeResolver::resolve(&relation))
    }

    /// Access check against the current state of the relation.
    pub async fn authorize(
        &self,
        relation_id: Uuid,
        action: Action,
        service: Option<&str>,
    ) -> OrgLinkResult<EffectiveScope> {
        let relation = self.relations.get_by_id(relation_id).await?;
        PermissionScopeResolver::authorize(&relation, action, service)
    }

    pub async fn audit_trail(
        &self,
        relation_id: Uuid,
        pagination: Pagination,
    ) -> OrgLinkResult<PaginatedResult<AuditLogEntry>> {
        self.relations.get_by_id(relation_id).await?;
        self.audit
            .list(
                AuditLogFilter {
                    relation_id: Some(relation_id),
                    ..Default::default()
                },
                pagination,
            )
            .await
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    /// Every relation matching `filter`, read page by page.
    async fn collect(&self, filter: RelationFilter) -> OrgLinkResult<Vec<OrganizationRelation>> {
        let mut all = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .relations
                .list(
                    filter.clone(),
                    Pagination {
                        offset,
                        limit: SCAN_PAGE,
                    },
                )
                .await?;
            let fetched = page.items.len() as u64;
            all.extend(page.items);
            offset += fetched;
            if fetched < SCAN_PAGE || offset >= page.total {
                return Ok(all);
            }
        }
    }

    /// Read, plan and compare-and-set under the per-relation lock.
    ///
    /// `plan` returns `None` for a no-op. A version conflict re-reads and
    /// re-plans up to `conflict_retries` times.
    async fn mutate<F>(&self, relation_id: Uuid, plan: F) -> OrgLinkResult<Mutation>
    where
        F: Fn(&OrganizationRelation) -> OrgLinkResult<Option<UpdateRelation>> + Send + Sync,
    {
        let lock = self.locks.entry(relation_id).or_default().value().clone();
        let guard = lock.lock_owned().await;

        let mut attempt = 0;
        let result = loop {
            let current = match self.relations.get_by_id(relation_id).await {
                Ok(current) => current,
                Err(err) => break Err(err),
            };
            let patch = match plan(&current) {
                Ok(Some(patch)) => patch,
                Ok(None) => break Ok(Mutation::Unchanged(current)),
                Err(err) => break Err(err),
            };
            match self
                .relations
                .update(relation_id, current.version, patch)
                .await
            {
                Ok(after) => {
                    break Ok(Mutation::Applied {
                        before: current,
                        after,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.config.conflict_retries => {
                    attempt += 1;
                    warn!(relation_id = %relation_id, attempt, "Version conflict, retrying");
                }
                Err(err) => break Err(err),
            }
        };

        drop(guard);
        self.locks
            .remove_if(&relation_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Append the audit record and publish the notification for a
    /// completed write. Neither can fail the command.
    async fn record(
        &self,
        action: &str,
        kind: RelationEventKind,
        actor: &Actor,
        previous_status: Option<RelationStatus>,
        relation: &OrganizationRelation,
        metadata: Option<serde_json::Value>,
    ) {
        let entry = CreateAuditLogEntry {
            relation_id: relation.id,
            actor: actor.clone(),
            action: action.to_string(),
            from_status: previous_status,
            to_status: Some(relation.status),
            reason: relation.status_reason.clone(),
            metadata,
        };
        if let Err(err) = self.audit.append(entry).await {
            error!(relation_id = %relation.id, action, error = %err, "Failed to write audit record");
        }

        self.notifier.notify(RelationEvent {
            kind,
            relation_id: relation.id,
            from_org_id: relation.from_org_id.clone(),
            to_org_id: relation.to_org_id.clone(),
            status: relation.status,
            previous_status,
            actor_id: actor.id.clone(),
            reason: relation.status_reason.clone(),
            occurred_at: Utc::now(),
        });
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, RelationError> {
    value.ok_or(RelationError::MissingField(field))
}

fn required_id(value: Option<String>, field: &'static str) -> Result<String, RelationError> {
    let id = required(value, field)?.trim().to_string();
    if id.is_empty() {
        return Err(RelationError::MissingField(field));
    }
    Ok(id)
}

/// Check required fields and build the store input.
pub fn validate_create(
    request: CreateRelationRequest,
    actor: &Actor,
    now: DateTime<Utc>,
) -> OrgLinkResult<CreateRelation> {
    let from_org_id = required_id(request.from_org_id, "fromOrgId")?;
    let to_org_id = required_id(request.to_org_id, "toOrgId")?;
    let relation_type = required(request.relation_type, "relationType")?;
    let data_share_type = required(request.data_share_type, "dataShareType")?;

    if from_org_id == to_org_id {
        return Err(RelationError::SameOrganization.into());
    }
    if request.end_date.is_some_and(|end| end <= now) {
        return Err(OrgLinkError::validation("endDate must be in the future"));
    }

    Ok(CreateRelation {
        from_org_id,
        to_org_id,
        relation_type,
        data_share_type,
        shared_data: request.shared_data,
        permissions: request.permissions.unwrap_or_default(),
        priority: request.priority.unwrap_or_default(),
        notes: request.notes,
        end_date: request.end_date,
        created_by: Some(actor.id.clone()),
    })
}

/// Approval as a single guarded patch: set the caller's flag and, when the
/// other side already consented, activate in the same write.
fn plan_approval(
    relation: &OrganizationRelation,
    org_id: &str,
) -> OrgLinkResult<Option<UpdateRelation>> {
    if relation.status != RelationStatus::Pending {
        return Err(OrgLinkError::IllegalTransition {
            relation_id: relation.id,
            current: relation.status,
            requested: "APPROVE".into(),
            reason: "only pending relations can be approved".into(),
        });
    }
    let state = ApprovalCoordinator::evaluate(relation, org_id).ok_or_else(|| {
        RelationError::NotParty {
            relation_id: relation.id,
            org_id: org_id.to_string(),
        }
    })?;
    if state.already_approved {
        return Ok(None);
    }

    let mut patch = UpdateRelation::default();
    let other_side_approved = match state.direction {
        Direction::Outgoing => {
            patch.approved_by_from_org = Some(true);
            relation.approved_by_to_org
        }
        Direction::Incoming => {
            patch.approved_by_to_org = Some(true);
            relation.approved_by_from_org
        }
    };
    if other_side_approved {
        patch.status = Some(RelationStatus::Active);
    }
    Ok(Some(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use orglink_core::external::{StaticDirectory, TracingNotifier};
    use orglink_core::models::relation::{DataShareType, RelationType};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// In-memory store whose `update` reports a version conflict a set
    /// number of times before applying the patch.
    #[derive(Clone)]
    struct ContendedStore {
        relation: Arc<StdMutex<OrganizationRelation>>,
        conflicts_left: Arc<AtomicU32>,
        updates: Arc<AtomicU32>,
    }

    impl ContendedStore {
        fn new(relation: OrganizationRelation, conflicts: u32) -> Self {
            Self {
                relation: Arc::new(StdMutex::new(relation)),
                conflicts_left: Arc::new(AtomicU32::new(conflicts)),
                updates: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    impl RelationRepository for ContendedStore {
        async fn create(&self, _: CreateRelation) -> OrgLinkResult<OrganizationRelation> {
            unreachable!()
        }
        async fn get_by_id(&self, _: Uuid) -> OrgLinkResult<OrganizationRelation> {
            Ok(self.relation.lock().unwrap().clone())
        }
        async fn list(
            &self,
            _: RelationFilter,
            _: Pagination,
        ) -> OrgLinkResult<PaginatedResult<OrganizationRelation>> {
            unreachable!()
        }
        async fn update(
            &self,
            _: Uuid,
            expected_version: u64,
            input: UpdateRelation,
        ) -> OrgLinkResult<OrganizationRelation> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            let pending_conflict = self
                .conflicts_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if pending_conflict {
                return Err(OrgLinkError::Conflict {
                    entity: "transaction".into(),
                    message: "write conflict".into(),
                });
            }
            let mut stored = self.relation.lock().unwrap();
            assert_eq!(stored.version, expected_version);
            if let Some(status) = input.status {
                stored.status = status;
            }
            if let Some(approved) = input.approved_by_from_org {
                stored.approved_by_from_org = approved;
            }
            if let Some(approved) = input.approved_by_to_org {
                stored.approved_by_to_org = approved;
            }
            if let Some(reason) = input.status_reason {
                stored.status_reason = reason;
            }
            stored.version += 1;
            Ok(stored.clone())
        }
    }

    struct DiscardAudit;

    impl AuditLogRepository for DiscardAudit {
        async fn append(&self, input: CreateAuditLogEntry) -> OrgLinkResult<AuditLogEntry> {
            Ok(AuditLogEntry {
                id: Uuid::new_v4(),
                relation_id: input.relation_id,
                actor_id: input.actor.id,
                actor_kind: input.actor.kind,
                action: input.action,
                from_status: input.from_status,
                to_status: input.to_status,
                reason: input.reason,
                metadata: serde_json::Value::Null,
                timestamp: Utc::now(),
            })
        }
        async fn list(
            &self,
            _: AuditLogFilter,
            _: Pagination,
        ) -> OrgLinkResult<PaginatedResult<AuditLogEntry>> {
            unreachable!()
        }
    }

    fn half_approved() -> OrganizationRelation {
        OrganizationRelation {
            id: Uuid::new_v4(),
            from_org_id: "ORG_A".into(),
            to_org_id: "ORG_B".into(),
            relation_type: RelationType::Collaborative,
            data_share_type: DataShareType::ReadOnly,
            status: RelationStatus::Pending,
            approved_by_from_org: true,
            approved_by_to_org: false,
            shared_data: Default::default(),
            permissions: Default::default(),
            priority: Default::default(),
            notes: None,
            status_reason: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            end_date: None,
            access_count: 0,
            last_accessed_at: None,
            version: 0,
        }
    }

    fn manager(
        store: &ContendedStore,
    ) -> RelationLifecycleManager<ContendedStore, DiscardAudit, StaticDirectory> {
        RelationLifecycleManager::new(
            store.clone(),
            DiscardAudit,
            StaticDirectory::open(),
            Arc::new(TracingNotifier),
            RelationConfig::default(),
        )
    }

    #[tokio::test]
    async fn version_conflict_is_retried_once_then_applied() {
        let rel = half_approved();
        let store = ContendedStore::new(rel.clone(), 1);

        let after = manager(&store)
            .approve(rel.id, "ORG_B", &Actor::user("bob"))
            .await
            .unwrap();

        assert_eq!(after.status, RelationStatus::Active);
        assert!(after.approved_by_from_org && after.approved_by_to_org);
        assert_eq!(store.updates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn persistent_conflict_surfaces_as_retryable() {
        let rel = half_approved();
        let store = ContendedStore::new(rel.clone(), u32::MAX);

        let err = manager(&store)
            .approve(rel.id, "ORG_B", &Actor::user("bob"))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        let retries = RelationConfig::default().conflict_retries;
        assert_eq!(store.updates.load(Ordering::SeqCst), retries + 1);
        assert_eq!(
            store.relation.lock().unwrap().status,
            RelationStatus::Pending
        );
    }

    fn request() -> CreateRelationRequest {
        CreateRelationRequest {
            from_org_id: Some("ORG_A".into()),
            to_org_id: Some("ORG_B".into()),
            relation_type: Some(RelationType::Collaborative),
            data_share_type: Some(DataShareType::ReadOnly),
            ..Default::default()
        }
    }

    #[test]
    fn create_requires_each_field() {
        let actor = Actor::user("alice");
        let cases: [(fn(&mut CreateRelationRequest), &str); 4] = [
            (|r| r.from_org_id = None, "fromOrgId"),
            (|r| r.to_org_id = Some("  ".into()), "toOrgId"),
            (|r| r.relation_type = None, "relationType"),
            (|r| r.data_share_type = None, "dataShareType"),
        ];
        for (mutate, field) in cases {
            let mut req = request();
            mutate(&mut req);
            let err = validate_create(req, &actor, Utc::now()).unwrap_err();
            assert!(err.to_string().contains(field), "{err} should name {field}");
        }
    }

    #[test]
    fn create_rejects_self_relation() {
        let mut req = request();
        req.to_org_id = Some("ORG_A".into());
        let err = validate_create(req, &Actor::user("alice"), Utc::now()).unwrap_err();
        assert!(matches!(err, OrgLinkError::Validation { .. }));
    }

    #[test]
    fn create_rejects_past_end_date() {
        let mut req = request();
        req.end_date = Some(Utc::now() - Duration::days(1));
        assert!(validate_create(req, &Actor::user("alice"), Utc::now()).is_err());
    }

    #[test]
    fn create_applies_defaults() {
        let input = validate_create(request(), &Actor::user("alice"), Utc::now()).unwrap();
        assert!(input.permissions.read);
        assert!(!input.permissions.write);
        assert_eq!(input.created_by.as_deref(), Some("alice"));
    }
}
