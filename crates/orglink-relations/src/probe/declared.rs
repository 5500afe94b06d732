//! Probe backend that answers from the relation's own declarations.
//!
//! Used when no partner transport is configured: a relation is reachable
//! once it is `Active`, authenticated once both parties consented, and
//! grants exactly its effective scope.

use std::collections::BTreeSet;
use std::time::Duration;

use orglink_core::models::relation::{Action, OrganizationRelation, RelationStatus};

use super::{ProbeBackend, StageFailure};
use crate::scope::EffectiveScope;

#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredProbe;

impl ProbeBackend for DeclaredProbe {
    async fn check_connectivity(
        &self,
        relation: &OrganizationRelation,
    ) -> Result<Duration, StageFailure> {
        match relation.status {
            RelationStatus::Active => Ok(Duration::ZERO),
            status => Err(StageFailure(format!("relation is {status}"))),
        }
    }

    async fn check_auth(&self, relation: &OrganizationRelation) -> Result<(), StageFailure> {
        if relation.fully_approved() {
            Ok(())
        } else {
            Err(StageFailure::new("consent from both parties is missing"))
        }
    }

    async fn check_permissions(
        &self,
        _relation: &OrganizationRelation,
        requested: &EffectiveScope,
    ) -> Result<BTreeSet<Action>, StageFailure> {
        Ok(requested.allowed_actions.clone())
    }

    async fn check_data_access(
        &self,
        _relation: &OrganizationRelation,
        services: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, StageFailure> {
        Ok(services.clone())
    }
}
