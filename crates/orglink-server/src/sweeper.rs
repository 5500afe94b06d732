//! Periodic expiry of relations past their end date.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::state::Lifecycle;

/// Spawn a task that runs `expire_overdue` every `every`. The first sweep
/// happens one interval after start.
pub fn spawn_expiry_sweeper(lifecycle: Arc<Lifecycle>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match lifecycle.expire_overdue(Utc::now()).await {
                Ok(expired) if expired.is_empty() => {}
                Ok(expired) => info!(expired = expired.len(), "Expiry sweep finished"),
                Err(e) => error!(error = %e, "Expiry sweep failed"),
            }
        }
    })
}
