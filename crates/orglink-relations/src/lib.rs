//! OrgLink Relations — the relation lifecycle and verification subsystem.
//!
//! Every service here is generic over the `orglink-core` repository
//! traits so that this crate has no dependency on the database layer.

pub mod analytics;
pub mod approval;
pub mod bulk;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod probe;
pub mod scope;
pub mod transition;

pub use analytics::{AnalyticsAggregator, AnalyticsWindow, RelationAnalytics};
pub use approval::{ApprovalCoordinator, ApprovalState};
pub use bulk::{BulkAction, BulkOperationExecutor, BulkReport, BulkRequest};
pub use config::RelationConfig;
pub use error::RelationError;
pub use lifecycle::{RelationLifecycleManager, RelationOverview};
pub use probe::{ConnectivityProbe, ProbeBackend, ProbeReport, StageStatus};
pub use scope::{EffectiveScope, PermissionScopeResolver};
