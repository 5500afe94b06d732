//! Deterministic probe backend with scripted per-stage outcomes.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use orglink_core::models::relation::{Action, OrganizationRelation};

use super::{ProbeBackend, StageFailure};
use crate::scope::EffectiveScope;

/// One stage's scripted behaviour: wait `delay`, then yield `outcome`.
#[derive(Debug, Clone)]
pub struct Scripted<T> {
    pub delay: Duration,
    pub outcome: Result<T, StageFailure>,
}

impl<T: Clone> Scripted<T> {
    fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(value),
        }
    }

    async fn play(&self, counter: &AtomicU32) -> Result<T, StageFailure> {
        counter.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// A [`ProbeBackend`] whose answers are fixed up front.
///
/// Permissions and data access default to echoing back whatever was
/// requested; `granting` and `serving` replace that with a fixed set.
#[derive(Debug)]
pub struct ScriptedProbe {
    pub connectivity: Scripted<Duration>,
    pub auth: Scripted<()>,
    pub permissions: Scripted<Option<BTreeSet<Action>>>,
    pub data_access: Scripted<Option<BTreeSet<String>>>,
    calls: [AtomicU32; 4],
}

impl ScriptedProbe {
    /// Every stage passes with 20 ms latency.
    pub fn healthy() -> Self {
        Self {
            connectivity: Scripted::ok(Duration::from_millis(20)),
            auth: Scripted::ok(()),
            permissions: Scripted::ok(None),
            data_access: Scripted::ok(None),
            calls: Default::default(),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.connectivity.outcome = Ok(latency);
        self
    }

    pub fn unreachable(mut self, message: &str) -> Self {
        self.connectivity.outcome = Err(StageFailure::new(message));
        self
    }

    pub fn rejecting_auth(mut self, message: &str) -> Self {
        self.auth.outcome = Err(StageFailure::new(message));
        self
    }

    pub fn delaying_auth(mut self, delay: Duration) -> Self {
        self.auth.delay = delay;
        self
    }

    pub fn granting(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.permissions.outcome = Ok(Some(actions.into_iter().collect()));
        self
    }

    pub fn serving<S: Into<String>>(mut self, services: impl IntoIterator<Item = S>) -> Self {
        self.data_access.outcome = Ok(Some(services.into_iter().map(Into::into).collect()));
        self
    }

    /// Invocation counts per stage, in execution order.
    pub fn calls(&self) -> [u32; 4] {
        [
            self.calls[0].load(Ordering::SeqCst),
            self.calls[1].load(Ordering::SeqCst),
            self.calls[2].load(Ordering::SeqCst),
            self.calls[3].load(Ordering::SeqCst),
        ]
    }
}

impl ProbeBackend for ScriptedProbe {
    async fn check_connectivity(
        &self,
        _relation: &OrganizationRelation,
    ) -> Result<Duration, StageFailure> {
        self.connectivity.play(&self.calls[0]).await
    }

    async fn check_auth(&self, _relation: &OrganizationRelation) -> Result<(), StageFailure> {
        self.auth.play(&self.calls[1]).await
    }

    async fn check_permissions(
        &self,
        _relation: &OrganizationRelation,
        requested: &EffectiveScope,
    ) -> Result<BTreeSet<Action>, StageFailure> {
        Ok(self
            .permissions
            .play(&self.calls[2])
            .await?
            .unwrap_or_else(|| requested.allowed_actions.clone()))
    }

    async fn check_data_access(
        &self,
        _relation: &OrganizationRelation,
        services: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, StageFailure> {
        Ok(self
            .data_access
            .play(&self.calls[3])
            .await?
            .unwrap_or_else(|| services.clone()))
    }
}
