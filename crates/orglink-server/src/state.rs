//! Shared application state.

use std::sync::Arc;

use orglink_core::external::{NotificationService, StaticDirectory};
use orglink_db::repository::{
    SurrealAccessLogRepository, SurrealAuditLogRepository, SurrealErrorLogRepository,
    SurrealRelationRepository,
};
use orglink_relations::probe::DeclaredProbe;
use orglink_relations::{
    AnalyticsAggregator, BulkOperationExecutor, ConnectivityProbe, RelationConfig,
    RelationLifecycleManager,
};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;

type Relations = SurrealRelationRepository<Any>;
type Audit = SurrealAuditLogRepository<Any>;

pub type Lifecycle = RelationLifecycleManager<Relations, Audit, StaticDirectory>;
pub type Analytics =
    AnalyticsAggregator<Relations, SurrealAccessLogRepository<Any>, SurrealErrorLogRepository<Any>>;
pub type Probe = ConnectivityProbe<Relations, DeclaredProbe>;
pub type Bulk = BulkOperationExecutor<Relations, Audit, StaticDirectory>;

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<Lifecycle>,
    pub analytics: Arc<Analytics>,
    pub probe: Arc<Probe>,
    pub bulk: Arc<Bulk>,
}

impl AppState {
    /// Wire every relation service onto one database handle.
    pub fn new(
        db: Surreal<Any>,
        directory: StaticDirectory,
        notifier: Arc<dyn NotificationService>,
        config: RelationConfig,
    ) -> Self {
        let uniqueness = config.uniqueness;
        let relations = || SurrealRelationRepository::with_uniqueness(db.clone(), uniqueness);

        let analytics = AnalyticsAggregator::new(
            relations(),
            SurrealAccessLogRepository::new(db.clone()),
            SurrealErrorLogRepository::new(db.clone()),
            &config,
        );
        let probe = ConnectivityProbe::new(relations(), DeclaredProbe, &config);
        let lifecycle = Arc::new(RelationLifecycleManager::new(
            relations(),
            SurrealAuditLogRepository::new(db.clone()),
            directory,
            notifier,
            config,
        ));

        Self {
            bulk: Arc::new(BulkOperationExecutor::new(lifecycle.clone())),
            lifecycle,
            analytics: Arc::new(analytics),
            probe: Arc::new(probe),
        }
    }
}
