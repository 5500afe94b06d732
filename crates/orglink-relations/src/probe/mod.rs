//! Staged verification of a relation's data channel.
//!
//! Four stages run in order: connectivity, authentication, permissions,
//! data access. Each stage is bounded by a timeout. A failed or timed-out
//! stage marks every later stage `skipped`. Stage failures are reported,
//! never raised; only a store fault fails the probe itself.

mod declared;
mod report;
mod scripted;

use std::collections::BTreeSet;
use std::time::Duration;

use orglink_core::error::OrgLinkResult;
use orglink_core::models::relation::{Action, OrganizationRelation};
use orglink_core::repository::RelationRepository;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RelationConfig;
use crate::scope::{EffectiveScope, PermissionScopeResolver};

pub use declared::DeclaredProbe;
pub use report::{ProbeReport, StageReport, StageStatus};
pub use scripted::{Scripted, ScriptedProbe};

/// A stage check that could not complete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct StageFailure(pub String);

impl StageFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Capability set a probe transport must provide.
pub trait ProbeBackend: Send + Sync {
    /// Reach the partner and return the measured round-trip latency.
    fn check_connectivity(
        &self,
        relation: &OrganizationRelation,
    ) -> impl Future<Output = Result<Duration, StageFailure>> + Send;

    /// Validate the credentials or certificate used for the partner.
    fn check_auth(
        &self,
        relation: &OrganizationRelation,
    ) -> impl Future<Output = Result<(), StageFailure>> + Send;

    /// Ask the partner which of the requested actions it actually grants.
    fn check_permissions(
        &self,
        relation: &OrganizationRelation,
        requested: &EffectiveScope,
    ) -> impl Future<Output = Result<BTreeSet<Action>, StageFailure>> + Send;

    /// Return the subset of `services` that could actually be retrieved.
    fn check_data_access(
        &self,
        relation: &OrganizationRelation,
        services: &BTreeSet<String>,
    ) -> impl Future<Output = Result<BTreeSet<String>, StageFailure>> + Send;
}

/// Runs the four probe stages against a [`ProbeBackend`].
pub struct ConnectivityProbe<R: RelationRepository, B: ProbeBackend> {
    relations: R,
    backend: B,
    stage_timeout: Duration,
    latency_threshold: Duration,
}

fn join(items: impl IntoIterator<Item = String>) -> String {
    items.into_iter().collect::<Vec<_>>().join(", ")
}

fn action_names(actions: &BTreeSet<Action>) -> String {
    join(actions.iter().map(|a| format!("{a:?}").to_lowercase()))
}

impl<R: RelationRepository, B: ProbeBackend> ConnectivityProbe<R, B> {
    pub fn new(relations: R, backend: B, config: &RelationConfig) -> Self {
        Self {
            relations,
            backend,
            stage_timeout: config.probe_stage_timeout,
            latency_threshold: config.latency_threshold,
        }
    }

    /// Probe the stored relation. Fails only when it cannot be loaded.
    pub async fn probe(&self, relation_id: Uuid) -> OrgLinkResult<ProbeReport> {
        let relation = self.relations.get_by_id(relation_id).await?;
        Ok(self.run(&relation).await)
    }

    /// Probe an already loaded relation. Never mutates it.
    pub async fn run(&self, relation: &OrganizationRelation) -> ProbeReport {
        let scope = PermissionScopeResolver::resolve(relation);

        let connection = self.connectivity_stage(relation).await;
        if connection.status == StageStatus::Error {
            return self.finish(
                relation.id,
                [connection],
                "connectivity check failed",
            );
        }

        let authentication = self.auth_stage(relation).await;
        if authentication.status == StageStatus::Error {
            return self.finish(
                relation.id,
                [connection, authentication],
                "authentication failed",
            );
        }

        let permissions = self.permissions_stage(relation, &scope).await;
        if permissions.status == StageStatus::Error {
            return self.finish(
                relation.id,
                [connection, authentication, permissions],
                "permission check failed",
            );
        }

        let data_access = self.data_access_stage(relation, &scope).await;
        self.finish(
            relation.id,
            [connection, authentication, permissions, data_access],
            "",
        )
    }

    fn finish<const N: usize>(
        &self,
        relation_id: Uuid,
        completed: [StageReport; N],
        skip_reason: &str,
    ) -> ProbeReport {
        let report = ProbeReport::assemble(relation_id, completed, skip_reason);
        match report.overall {
            StageStatus::Success => info!(relation_id = %relation_id, "Probe succeeded"),
            status => warn!(relation_id = %relation_id, overall = ?status, "Probe reported problems"),
        }
        report
    }

    /// Await `check` under the stage timeout, returning the outcome and the
    /// elapsed time.
    async fn timed<T>(
        &self,
        check: impl Future<Output = Result<T, StageFailure>>,
    ) -> (Result<T, StageFailure>, Duration) {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.stage_timeout, check).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StageFailure(format!(
                "timed out after {} ms",
                self.stage_timeout.as_millis()
            ))),
        };
        (outcome, started.elapsed())
    }

    async fn connectivity_stage(&self, relation: &OrganizationRelation) -> StageReport {
        let (outcome, elapsed) = self.timed(self.backend.check_connectivity(relation)).await;
        match outcome {
            Ok(latency) if latency > self.latency_threshold => StageReport::error(
                format!(
                    "latency {} ms exceeds threshold of {} ms",
                    latency.as_millis(),
                    self.latency_threshold.as_millis()
                ),
                Some(latency),
            ),
            Ok(latency) => StageReport::success("partner reachable", Some(latency)),
            Err(failure) => StageReport::error(failure.0, Some(elapsed)),
        }
    }

    async fn auth_stage(&self, relation: &OrganizationRelation) -> StageReport {
        let (outcome, elapsed) = self.timed(self.backend.check_auth(relation)).await;
        match outcome {
            Ok(()) => StageReport::success("credentials accepted", Some(elapsed)),
            Err(failure) => StageReport::error(failure.0, Some(elapsed)),
        }
    }

    async fn permissions_stage(
        &self,
        relation: &OrganizationRelation,
        scope: &EffectiveScope,
    ) -> StageReport {
        let (outcome, elapsed) = self
            .timed(self.backend.check_permissions(relation, scope))
            .await;
        let granted = match outcome {
            Ok(granted) => granted,
            Err(failure) => return StageReport::error(failure.0, Some(elapsed)),
        };

        let requested = &scope.allowed_actions;
        if requested.is_empty() {
            return StageReport::warning("relation scope grants no actions", Some(elapsed));
        }
        let effective: BTreeSet<Action> = requested.intersection(&granted).copied().collect();
        if effective.len() == requested.len() {
            StageReport::success(
                format!("full scope granted: {}", action_names(requested)),
                Some(elapsed),
            )
        } else if effective.is_empty() {
            StageReport::error(
                format!("none of the requested actions granted: {}", action_names(requested)),
                Some(elapsed),
            )
        } else {
            let missing: BTreeSet<Action> = requested.difference(&effective).copied().collect();
            StageReport::warning(
                format!("reduced scope, missing: {}", action_names(&missing)),
                Some(elapsed),
            )
        }
    }

    async fn data_access_stage(
        &self,
        relation: &OrganizationRelation,
        scope: &EffectiveScope,
    ) -> StageReport {
        let services = &scope.allowed_services;
        let (outcome, elapsed) = self
            .timed(self.backend.check_data_access(relation, services))
            .await;
        let retrieved = match outcome {
            Ok(retrieved) => retrieved,
            Err(failure) => return StageReport::error(failure.0, Some(elapsed)),
        };

        if services.is_empty() {
            return StageReport::success("no services declared", Some(elapsed));
        }
        let reachable: BTreeSet<&String> = services.intersection(&retrieved).collect();
        if reachable.len() == services.len() {
            StageReport::success(
                format!("all {} services retrievable", services.len()),
                Some(elapsed),
            )
        } else if reachable.is_empty() {
            StageReport::error("no shared service is retrievable", Some(elapsed))
        } else {
            let missing = services
                .iter()
                .filter(|s| !reachable.contains(s))
                .cloned();
            StageReport::warning(
                format!("unreachable services: {}", join(missing)),
                Some(elapsed),
            )
        }
    }
}
