//! Audit log domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::relation::RelationStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    #[default]
    User,
    /// Scheduled jobs and other internal callers. Only the system may
    /// expire a relation.
    System,
}

impl ActorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

/// Who is performing a lifecycle command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    pub kind: ActorKind,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ActorKind::User,
        }
    }

    pub fn system() -> Self {
        Self {
            id: "system".into(),
            kind: ActorKind::System,
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == ActorKind::System
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub relation_id: Uuid,
    pub actor_id: String,
    pub actor_kind: ActorKind,
    /// Lifecycle command name (e.g. `relation.approve`).
    pub action: String,
    pub from_status: Option<RelationStatus>,
    pub to_status: Option<RelationStatus>,
    pub reason: Option<String>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateAuditLogEntry {
    pub relation_id: Uuid,
    pub actor: Actor,
    pub action: String,
    pub from_status: Option<RelationStatus>,
    pub to_status: Option<RelationStatus>,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
