//! Error types for the OrgLink system.

use thiserror::Error;
use uuid::Uuid;

use crate::models::relation::RelationStatus;

#[derive(Debug, Error)]
pub enum OrgLinkError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The requested transition is not allowed from the relation's
    /// current status. State is left untouched.
    #[error("Illegal transition for relation {relation_id}: {current} -> {requested} ({reason})")]
    IllegalTransition {
        relation_id: Uuid,
        current: RelationStatus,
        requested: String,
        reason: String,
    },

    /// A concurrent writer changed the entity first. Retryable.
    #[error("Conflict on {entity}: {message}")]
    Conflict { entity: String, message: String },

    #[error("Authorization denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrgLinkError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn relation_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "relation".into(),
            id: id.to_string(),
        }
    }

    /// Whether the caller may refetch and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Stable machine-readable code, used in API bodies and bulk reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation { .. } => "validation_error",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::Conflict { .. } => "conflict",
            Self::AuthorizationDenied { .. } => "forbidden",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }
}

pub type OrgLinkResult<T> = Result<T, OrgLinkError>;
