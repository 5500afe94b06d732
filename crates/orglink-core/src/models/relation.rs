//! Organization relation domain model.
//!
//! A relation is a data-sharing agreement between two organizations.
//! It only becomes `Active` once both parties have consented.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrgLinkError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    Hierarchical,
    Collaborative,
    Informational,
}

/// Baseline access level granted by a relation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataShareType {
    ReadOnly,
    ReadWrite,
    Full,
    /// No baseline restriction; the explicit permission map decides.
    Custom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationStatus {
    Pending,
    Active,
    Suspended,
    Expired,
    Revoked,
}

impl RelationStatus {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Expired | Self::Revoked)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Orientation of a relation relative to a viewing organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The viewing organization is `from_org_id`.
    Outgoing,
    /// The viewing organization is `to_org_id`.
    Incoming,
}

/// A capability a relation may grant to the partner organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Write,
    Update,
    Export,
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Write,
        Action::Update,
        Action::Export,
        Action::Delete,
    ];
}

/// Explicit capability map declared on a relation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelationPermissions {
    pub read: bool,
    pub write: bool,
    pub update: bool,
    pub export: bool,
    pub delete: bool,
}

impl Default for RelationPermissions {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            update: false,
            export: false,
            delete: false,
        }
    }
}

impl RelationPermissions {
    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Read => self.read,
            Action::Write => self.write,
            Action::Update => self.update,
            Action::Export => self.export,
            Action::Delete => self.delete,
        }
    }

    /// The set of actions flagged `true`.
    pub fn granted(&self) -> BTreeSet<Action> {
        Action::ALL
            .into_iter()
            .filter(|a| self.allows(*a))
            .collect()
    }
}

/// The concrete resources a relation exposes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedData {
    pub services: BTreeSet<String>,
    pub custom_config: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationRelation {
    pub id: Uuid,
    pub from_org_id: String,
    pub to_org_id: String,
    pub relation_type: RelationType,
    pub data_share_type: DataShareType,
    pub status: RelationStatus,
    pub approved_by_from_org: bool,
    pub approved_by_to_org: bool,
    pub shared_data: SharedData,
    pub permissions: RelationPermissions,
    pub priority: Priority,
    pub notes: Option<String>,
    /// Reason given with the most recent status change.
    pub status_reason: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub access_count: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version, bumped on every guarded update.
    pub version: u64,
}

impl OrganizationRelation {
    pub fn is_party(&self, org_id: &str) -> bool {
        self.from_org_id == org_id || self.to_org_id == org_id
    }

    pub fn fully_approved(&self) -> bool {
        self.approved_by_from_org && self.approved_by_to_org
    }
}

/// Fields accepted when creating a relation.
///
/// Required fields are optional here so that a missing value is reported
/// as a validation error instead of a decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateRelationRequest {
    pub from_org_id: Option<String>,
    pub to_org_id: Option<String>,
    pub relation_type: Option<RelationType>,
    pub data_share_type: Option<DataShareType>,
    pub shared_data: SharedData,
    pub permissions: Option<RelationPermissions>,
    pub priority: Option<Priority>,
    pub notes: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
}

/// A validated relation ready to be persisted in `Pending`.
#[derive(Debug, Clone)]
pub struct CreateRelation {
    pub from_org_id: String,
    pub to_org_id: String,
    pub relation_type: RelationType,
    pub data_share_type: DataShareType,
    pub shared_data: SharedData,
    pub permissions: RelationPermissions,
    pub priority: Priority,
    pub notes: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
}

/// Guarded patch applied by the lifecycle manager.
///
/// Access counters are deliberately absent: only the analytics path
/// touches them.
#[derive(Debug, Clone, Default)]
pub struct UpdateRelation {
    pub status: Option<RelationStatus>,
    pub approved_by_from_org: Option<bool>,
    pub approved_by_to_org: Option<bool>,
    /// `Some(Some(v))` = set, `Some(None)` = clear, `None` = no change.
    pub status_reason: Option<Option<String>>,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hierarchical => "HIERARCHICAL",
            Self::Collaborative => "COLLABORATIVE",
            Self::Informational => "INFORMATIONAL",
        }
    }
}

impl DataShareType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "READ_ONLY",
            Self::ReadWrite => "READ_WRITE",
            Self::Full => "FULL",
            Self::Custom => "CUSTOM",
        }
    }
}

impl RelationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
        }
    }
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for RelationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown(kind: &str, value: &str) -> OrgLinkError {
    OrgLinkError::validation(format!("unknown {kind}: {value}"))
}

impl FromStr for RelationType {
    type Err = OrgLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIERARCHICAL" => Ok(Self::Hierarchical),
            "COLLABORATIVE" => Ok(Self::Collaborative),
            "INFORMATIONAL" => Ok(Self::Informational),
            other => Err(unknown("relation type", other)),
        }
    }
}

impl FromStr for DataShareType {
    type Err = OrgLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ_ONLY" => Ok(Self::ReadOnly),
            "READ_WRITE" => Ok(Self::ReadWrite),
            "FULL" => Ok(Self::Full),
            "CUSTOM" => Ok(Self::Custom),
            other => Err(unknown("data share type", other)),
        }
    }
}

impl FromStr for RelationStatus {
    type Err = OrgLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACTIVE" => Ok(Self::Active),
            "SUSPENDED" => Ok(Self::Suspended),
            "EXPIRED" => Ok(Self::Expired),
            "REVOKED" => Ok(Self::Revoked),
            other => Err(unknown("relation status", other)),
        }
    }
}

impl FromStr for Priority {
    type Err = OrgLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            other => Err(unknown("priority", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_match_wire_format() {
        for status in [
            RelationStatus::Pending,
            RelationStatus::Active,
            RelationStatus::Suspended,
            RelationStatus::Expired,
            RelationStatus::Revoked,
        ] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::Value::String(status.as_str().into()));
            assert_eq!(status.as_str().parse::<RelationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn only_expired_and_revoked_are_terminal() {
        assert!(RelationStatus::Expired.is_terminal());
        assert!(RelationStatus::Revoked.is_terminal());
        assert!(!RelationStatus::Pending.is_terminal());
        assert!(!RelationStatus::Active.is_terminal());
        assert!(!RelationStatus::Suspended.is_terminal());
    }

    #[test]
    fn default_permissions_grant_read_only() {
        let perms = RelationPermissions::default();
        assert_eq!(perms.granted(), BTreeSet::from([Action::Read]));
    }

    #[test]
    fn create_request_tolerates_missing_fields() {
        let req: CreateRelationRequest =
            serde_json::from_str(r#"{"fromOrgId":"ORG_A"}"#).unwrap();
        assert_eq!(req.from_org_id.as_deref(), Some("ORG_A"));
        assert!(req.to_org_id.is_none());
        assert!(req.relation_type.is_none());
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        let err = "ARCHIVED".parse::<RelationStatus>().unwrap_err();
        assert!(matches!(err, OrgLinkError::Validation { .. }));
    }
}
