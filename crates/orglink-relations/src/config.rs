//! Relation subsystem configuration.

use std::time::Duration;

use orglink_core::repository::UniquenessPolicy;

/// Configuration for the relation services.
#[derive(Debug, Clone)]
pub struct RelationConfig {
    /// Upper bound on each probe stage (default: 5 s).
    pub probe_stage_timeout: Duration,
    /// Connectivity fails when the measured latency exceeds this
    /// (default: 1 s).
    pub latency_threshold: Duration,
    /// Relations processed at once by a bulk operation (default: 8).
    pub bulk_concurrency: usize,
    /// Largest accepted bulk batch after de-duplication (default: 500).
    pub max_bulk_size: usize,
    /// Automatic retries after a version conflict (default: 1).
    pub conflict_retries: u32,
    /// Width of the rolling `monthlyAccess` window (default: 30 days).
    pub monthly_window_days: u32,
    /// Widest `<n>d` analytics window accepted (default: 366 days).
    pub max_window_days: u32,
    /// Secret mixed into bulk confirmation tokens.
    pub confirmation_secret: String,
    /// Duplicate policy handed to the relation store.
    pub uniqueness: UniquenessPolicy,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            probe_stage_timeout: Duration::from_millis(5_000),
            latency_threshold: Duration::from_millis(1_000),
            bulk_concurrency: 8,
            max_bulk_size: 500,
            conflict_retries: 1,
            monthly_window_days: 30,
            max_window_days: 366,
            confirmation_secret: "orglink".into(),
            uniqueness: UniquenessPolicy::default(),
        }
    }
}
