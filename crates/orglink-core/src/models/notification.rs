//! Events published to the notification system after a transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::relation::RelationStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationEventKind {
    Created,
    Approved,
    Activated,
    StatusChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationEvent {
    pub kind: RelationEventKind,
    pub relation_id: Uuid,
    pub from_org_id: String,
    pub to_org_id: String,
    pub status: RelationStatus,
    pub previous_status: Option<RelationStatus>,
    pub actor_id: String,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
