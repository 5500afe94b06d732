//! Bulk operations over sets of relations.
//!
//! Each id is processed independently through the lifecycle manager, so
//! one failure never aborts the batch. Destructive actions must carry a
//! confirmation token bound to the exact action and id set.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use orglink_core::error::OrgLinkResult;
use orglink_core::external::OrganizationDirectory;
use orglink_core::models::audit::Actor;
use orglink_core::models::relation::{OrganizationRelation, RelationStatus};
use orglink_core::repository::{AuditLogRepository, RelationRepository};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::error::RelationError;
use crate::lifecycle::RelationLifecycleManager;
use crate::transition::normalize_reason;

const ARCHIVE_REASON: &str = "archived";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Approve,
    Suspend,
    /// Revokes the relation.
    Archive,
    /// Returns relation snapshots; mutates nothing.
    Export,
}

impl BulkAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Suspend => "suspend",
            Self::Archive => "archive",
            Self::Export => "export",
        }
    }

    pub fn is_destructive(self) -> bool {
        matches!(self, Self::Suspend | Self::Archive)
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<Uuid>,
    /// Approving organization, required for `approve`.
    #[serde(default)]
    pub org_id: Option<String>,
    /// Required for `suspend`, optional for `archive`.
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub confirmation_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub id: Uuid,
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkReport {
    pub action: BulkAction,
    pub succeeded: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exported: Vec<OrganizationRelation>,
}

/// De-duplicate while keeping first-seen order.
fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Hex SHA-256 over the secret, the action and the sorted, de-duplicated
/// ids. Reordering or repeating ids yields the same token.
pub fn confirmation_token(secret: &str, action: BulkAction, ids: &[Uuid]) -> String {
    let mut sorted = dedup(ids);
    sorted.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b"\n");
    hasher.update(action.as_str().as_bytes());
    for id in sorted {
        hasher.update(b"\n");
        hasher.update(id.as_bytes());
    }
    hex::encode(hasher.finalize())
}

enum ItemOutcome {
    Done,
    Exported(OrganizationRelation),
}

pub struct BulkOperationExecutor<
    R: RelationRepository,
    A: AuditLogRepository,
    D: OrganizationDirectory,
> {
    lifecycle: Arc<RelationLifecycleManager<R, A, D>>,
}

impl<R: RelationRepository, A: AuditLogRepository, D: OrganizationDirectory>
    BulkOperationExecutor<R, A, D>
{
    pub fn new(lifecycle: Arc<RelationLifecycleManager<R, A, D>>) -> Self {
        Self { lifecycle }
    }

    /// The token a caller must present to run `action` over `ids`.
    pub fn issue_confirmation(&self, action: BulkAction, ids: &[Uuid]) -> String {
        confirmation_token(&self.lifecycle.config().confirmation_secret, action, ids)
    }

    /// Run `request`. Request-level problems (empty or oversized batch,
    /// missing parameters, bad confirmation) reject the whole call before
    /// any item runs; item failures are reported in the result.
    pub async fn apply(&self, request: BulkRequest, actor: &Actor) -> OrgLinkResult<BulkReport> {
        let config = self.lifecycle.config();
        let ids = dedup(&request.ids);
        if ids.is_empty() {
            return Err(RelationError::EmptyBatch.into());
        }
        if ids.len() > config.max_bulk_size {
            return Err(RelationError::BatchTooLarge {
                size: ids.len(),
                max: config.max_bulk_size,
            }
            .into());
        }

        let action = request.action;
        if action.is_destructive() {
            let expected = self.issue_confirmation(action, &ids);
            match request.confirmation_token.as_deref() {
                None => return Err(RelationError::ConfirmationRequired(action.as_str()).into()),
                Some(token) if token != expected => {
                    return Err(RelationError::ConfirmationMismatch.into());
                }
                Some(_) => {}
            }
        }

        let org_id = match action {
            BulkAction::Approve => Some(
                request
                    .org_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .ok_or(RelationError::MissingField("orgId"))?,
            ),
            _ => None,
        };
        let reason = match action {
            BulkAction::Suspend => Some(
                normalize_reason(request.reason.as_deref()).ok_or(RelationError::ReasonRequired)?,
            ),
            BulkAction::Archive => Some(
                normalize_reason(request.reason.as_deref())
                    .unwrap_or_else(|| ARCHIVE_REASON.to_string()),
            ),
            _ => None,
        };

        let run_one = |id: Uuid| {
            let reason = reason.as_deref();
            async move {
                let outcome = match action {
                    BulkAction::Approve => self
                        .lifecycle
                        .approve(id, org_id.unwrap_or_default(), actor)
                        .await
                        .map(|_| ItemOutcome::Done),
                    BulkAction::Suspend => self
                        .lifecycle
                        .set_status(id, RelationStatus::Suspended, reason, actor)
                        .await
                        .map(|_| ItemOutcome::Done),
                    BulkAction::Archive => self
                        .lifecycle
                        .set_status(id, RelationStatus::Revoked, reason, actor)
                        .await
                        .map(|_| ItemOutcome::Done),
                    BulkAction::Export => self.lifecycle.get(id).await.map(ItemOutcome::Exported),
                };
                (id, outcome)
            }
        };

        let outcomes: Vec<_> = stream::iter(ids)
            .map(run_one)
            .buffered(config.bulk_concurrency.max(1))
            .collect()
            .await;

        let mut report = BulkReport {
            action,
            succeeded: Vec::new(),
            failed: Vec::new(),
            exported: Vec::new(),
        };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(ItemOutcome::Done) => report.succeeded.push(id),
                Ok(ItemOutcome::Exported(relation)) => {
                    report.succeeded.push(id);
                    report.exported.push(relation);
                }
                Err(err) => report.failed.push(BulkFailure {
                    id,
                    code: err.code(),
                    error: err.to_string(),
                }),
            }
        }

        info!(
            action = %action,
            actor = %actor.id,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Bulk operation finished"
        );
        Ok(report)
    }
}
