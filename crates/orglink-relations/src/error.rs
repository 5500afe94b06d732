//! Relation subsystem error types.

use orglink_core::error::OrgLinkError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("an organization cannot enter a relation with itself")]
    SameOrganization,

    #[error("unknown organization: {0}")]
    UnknownOrganization(String),

    #[error("organization {org_id} is not a party to relation {relation_id}")]
    NotParty { relation_id: Uuid, org_id: String },

    #[error("a reason is required to suspend a relation")]
    ReasonRequired,

    #[error("bulk {0} requires a confirmation token")]
    ConfirmationRequired(&'static str),

    #[error("confirmation token does not match the requested batch")]
    ConfirmationMismatch,

    #[error("bulk request contains no relation ids")]
    EmptyBatch,

    #[error("bulk request has {size} relations, the maximum is {max}")]
    BatchTooLarge { size: usize, max: usize },
}

impl From<RelationError> for OrgLinkError {
    fn from(err: RelationError) -> Self {
        match err {
            RelationError::NotParty { .. }
            | RelationError::ConfirmationRequired(_)
            | RelationError::ConfirmationMismatch => OrgLinkError::AuthorizationDenied {
                reason: err.to_string(),
            },
            RelationError::MissingField(_)
            | RelationError::SameOrganization
            | RelationError::UnknownOrganization(_)
            | RelationError::ReasonRequired
            | RelationError::EmptyBatch
            | RelationError::BatchTooLarge { .. } => OrgLinkError::validation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_failures_are_denials() {
        let err: OrgLinkError = RelationError::ConfirmationMismatch.into();
        assert!(matches!(err, OrgLinkError::AuthorizationDenied { .. }));
    }

    #[test]
    fn field_problems_are_validation_errors() {
        let err: OrgLinkError = RelationError::MissingField("fromOrgId").into();
        assert_eq!(err.to_string(), "Validation error: fromOrgId is required");
    }
}
