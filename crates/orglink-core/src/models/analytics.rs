//! Access and error event models for relation usage analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded use of a relation by the partner organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessEvent {
    pub id: Uuid,
    pub relation_id: Uuid,
    pub action: String,
    pub success: bool,
    pub response_time_ms: u64,
    pub data_type: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAccess {
    pub action: String,
    pub success: bool,
    pub response_time_ms: u64,
    pub data_type: String,
    /// Defaults to the time of recording.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct CreateAccessEvent {
    pub relation_id: Uuid,
    pub action: String,
    pub success: bool,
    pub response_time_ms: u64,
    pub data_type: String,
    pub occurred_at: DateTime<Utc>,
}

/// A failure tracked separately from the access log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub id: Uuid,
    pub relation_id: Uuid,
    pub description: String,
    pub attempts: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    pub description: String,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_attempts() -> u32 {
    1
}

#[derive(Debug, Clone)]
pub struct CreateErrorEvent {
    pub relation_id: Uuid,
    pub description: String,
    pub attempts: u32,
    pub occurred_at: DateTime<Utc>,
}
