//! Narrow interfaces to collaborators outside the relation subsystem.
//!
//! The organization catalog is read-only and the notification system is
//! fire-and-forget; neither can fail a lifecycle command after the
//! relation has been written.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{OrgLinkError, OrgLinkResult};
use crate::models::notification::RelationEvent;
use crate::models::organization::OrganizationSummary;

pub trait OrganizationDirectory: Send + Sync {
    fn list(&self) -> impl Future<Output = OrgLinkResult<Vec<OrganizationSummary>>> + Send;

    /// Whether `org_id` names a known organization.
    fn contains(&self, org_id: &str) -> impl Future<Output = OrgLinkResult<bool>> + Send {
        async move { Ok(self.list().await?.iter().any(|o| o.id == org_id)) }
    }
}

/// In-process directory backed by a fixed list of organizations.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    entries: HashMap<String, OrganizationSummary>,
    /// When set, ids missing from `entries` are still accepted.
    open: bool,
}

impl StaticDirectory {
    pub fn new(entries: impl IntoIterator<Item = OrganizationSummary>) -> Self {
        Self {
            entries: entries.into_iter().map(|o| (o.id.clone(), o)).collect(),
            open: false,
        }
    }

    /// A directory that accepts every organization id. Used when no
    /// catalog is configured.
    pub fn open() -> Self {
        Self {
            entries: HashMap::new(),
            open: true,
        }
    }

    /// Load a JSON array of [`OrganizationSummary`] from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> OrgLinkResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrgLinkError::Internal(format!("cannot read directory {}: {e}", path.display()))
        })?;
        let entries: Vec<OrganizationSummary> = serde_json::from_str(&raw).map_err(|e| {
            OrgLinkError::Internal(format!("invalid directory {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), organizations = entries.len(), "Loaded organization directory");
        Ok(Self::new(entries))
    }
}

impl OrganizationDirectory for StaticDirectory {
    async fn list(&self) -> OrgLinkResult<Vec<OrganizationSummary>> {
        let mut items: Vec<_> = self.entries.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn contains(&self, org_id: &str) -> OrgLinkResult<bool> {
        Ok(self.open || self.entries.contains_key(org_id))
    }
}

/// Fire-and-forget sink for relation events. Delivery is not awaited.
pub trait NotificationService: Send + Sync {
    fn notify(&self, event: RelationEvent);
}

/// Publishes each event as a structured log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl NotificationService for TracingNotifier {
    fn notify(&self, event: RelationEvent) {
        info!(
            target: "orglink::notification",
            kind = ?event.kind,
            relation_id = %event.relation_id,
            from_org_id = %event.from_org_id,
            to_org_id = %event.to_org_id,
            status = %event.status,
            actor_id = %event.actor_id,
            "Relation event"
        );
    }
}
