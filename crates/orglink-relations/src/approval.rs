//! Per-side consent tracking.
//!
//! Answers are derived only from `from_org_id`/`to_org_id` and the two
//! approval flags, so the lifecycle manager and read-side queries always
//! agree.

use orglink_core::models::relation::{Direction, OrganizationRelation};
use serde::Serialize;

/// Consent state of a relation as seen from one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalState {
    pub direction: Direction,
    /// Whether the viewing organization has already approved.
    pub already_approved: bool,
    /// The first party, `from` before `to`, whose approval is still
    /// missing. `None` once both sides have consented.
    pub still_needs_approval_from: Option<String>,
}

pub struct ApprovalCoordinator;

impl ApprovalCoordinator {
    /// Orientation of `relation` relative to `org_id`, or `None` when the
    /// organization is not a party.
    pub fn direction(relation: &OrganizationRelation, org_id: &str) -> Option<Direction> {
        if relation.from_org_id == org_id {
            Some(Direction::Outgoing)
        } else if relation.to_org_id == org_id {
            Some(Direction::Incoming)
        } else {
            None
        }
    }

    pub fn evaluate(relation: &OrganizationRelation, org_id: &str) -> Option<ApprovalState> {
        let direction = Self::direction(relation, org_id)?;
        let already_approved = match direction {
            Direction::Outgoing => relation.approved_by_from_org,
            Direction::Incoming => relation.approved_by_to_org,
        };
        let still_needs_approval_from = if !relation.approved_by_from_org {
            Some(relation.from_org_id.clone())
        } else if !relation.approved_by_to_org {
            Some(relation.to_org_id.clone())
        } else {
            None
        };
        Some(ApprovalState {
            direction,
            already_approved,
            still_needs_approval_from,
        })
    }

    /// Whether `org_id` is a party that still has to approve.
    pub fn awaits(relation: &OrganizationRelation, org_id: &str) -> bool {
        Self::evaluate(relation, org_id).is_some_and(|state| !state.already_approved)
    }
}
