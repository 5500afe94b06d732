//! Status transition table.
//!
//! | from                         | to        | condition                          |
//! |------------------------------|-----------|------------------------------------|
//! | `Active`                     | Suspended | non-empty reason                   |
//! | `Suspended`                  | Active    |                                    |
//! | `Pending/Active/Suspended`   | Revoked   |                                    |
//! | `Pending/Active/Suspended`   | Expired   | system actor, `end_date <= now`    |
//!
//! `Pending -> Active` is reserved for the approval flow. Everything else,
//! including any move out of a terminal state, is an illegal transition.

use chrono::{DateTime, Utc};
use orglink_core::error::{OrgLinkError, OrgLinkResult};
use orglink_core::models::audit::Actor;
use orglink_core::models::relation::{OrganizationRelation, RelationStatus, UpdateRelation};

use crate::error::RelationError;

fn illegal(
    relation: &OrganizationRelation,
    requested: RelationStatus,
    reason: impl Into<String>,
) -> OrgLinkError {
    OrgLinkError::IllegalTransition {
        relation_id: relation.id,
        current: relation.status,
        requested: requested.as_str().to_string(),
        reason: reason.into(),
    }
}

/// Blank reasons count as absent.
pub fn normalize_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

/// Validate `relation.status -> requested` and build the guarded patch.
pub fn plan_status_change(
    relation: &OrganizationRelation,
    requested: RelationStatus,
    reason: Option<&str>,
    actor: &Actor,
    now: DateTime<Utc>,
) -> OrgLinkResult<UpdateRelation> {
    let current = relation.status;
    if current.is_terminal() {
        return Err(illegal(relation, requested, "relation is in a terminal state"));
    }
    if current == requested {
        return Err(illegal(relation, requested, "relation already has this status"));
    }

    let reason = normalize_reason(reason);
    match (current, requested) {
        (RelationStatus::Active, RelationStatus::Suspended) => {
            if reason.is_none() {
                return Err(RelationError::ReasonRequired.into());
            }
        }
        (RelationStatus::Suspended, RelationStatus::Active) => {}
        (_, RelationStatus::Revoked) => {}
        (_, RelationStatus::Expired) => {
            if !actor.is_system() {
                return Err(illegal(
                    relation,
                    requested,
                    "only the system may expire a relation",
                ));
            }
            match relation.end_date {
                Some(end) if end <= now => {}
                Some(_) => {
                    return Err(illegal(relation, requested, "end date has not been reached"));
                }
                None => return Err(illegal(relation, requested, "relation has no end date")),
            }
        }
        (RelationStatus::Pending, RelationStatus::Active) => {
            return Err(illegal(
                relation,
                requested,
                "pending relations become active only once both parties approve",
            ));
        }
        _ => return Err(illegal(relation, requested, "transition not permitted")),
    }

    Ok(UpdateRelation {
        status: Some(requested),
        status_reason: Some(reason),
        ..Default::default()
    })
}
