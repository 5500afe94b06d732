//! Shared fixtures for relation service integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use orglink_core::external::{NotificationService, StaticDirectory};
use orglink_core::models::audit::Actor;
use orglink_core::models::notification::{RelationEvent, RelationEventKind};
use orglink_core::models::organization::OrganizationSummary;
use orglink_core::models::relation::{
    CreateRelationRequest, DataShareType, OrganizationRelation, RelationType,
};
use orglink_db::repository::{
    SurrealAccessLogRepository, SurrealAuditLogRepository, SurrealErrorLogRepository,
    SurrealRelationRepository,
};
use orglink_relations::{AnalyticsAggregator, RelationConfig, RelationLifecycleManager};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

pub type Manager = RelationLifecycleManager<
    SurrealRelationRepository<Db>,
    SurrealAuditLogRepository<Db>,
    StaticDirectory,
>;

pub type Analytics = AnalyticsAggregator<
    SurrealRelationRepository<Db>,
    SurrealAccessLogRepository<Db>,
    SurrealErrorLogRepository<Db>,
>;

/// Captures every published event.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<RelationEvent>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<RelationEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

impl NotificationService for RecordingNotifier {
    fn notify(&self, event: RelationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Fixture {
    pub db: Surreal<Db>,
    pub manager: Arc<Manager>,
    pub notifier: Arc<RecordingNotifier>,
}

fn org(id: &str) -> OrganizationSummary {
    OrganizationSummary {
        id: id.into(),
        name: format!("Organization {id}"),
        code: id.to_lowercase(),
        org_type: "AGENCY".into(),
    }
}

pub async fn database() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orglink_db::run_migrations(&db).await.unwrap();
    db
}

pub async fn setup() -> Fixture {
    setup_with(RelationConfig::default()).await
}

pub async fn setup_with(config: RelationConfig) -> Fixture {
    let db = database().await;
    let notifier = Arc::new(RecordingNotifier::default());
    let manager = manager_over(&db, notifier.clone(), config);
    Fixture {
        db,
        manager: Arc::new(manager),
        notifier,
    }
}

/// A lifecycle manager with its own lock table over an existing database,
/// standing in for a second server process.
pub fn manager_over(
    db: &Surreal<Db>,
    notifier: Arc<RecordingNotifier>,
    config: RelationConfig,
) -> Manager {
    RelationLifecycleManager::new(
        SurrealRelationRepository::with_uniqueness(db.clone(), config.uniqueness),
        SurrealAuditLogRepository::new(db.clone()),
        StaticDirectory::new([org("ORG_A"), org("ORG_B"), org("ORG_C")]),
        notifier,
        config,
    )
}

pub fn analytics(db: &Surreal<Db>) -> Analytics {
    analytics_with(db, &RelationConfig::default())
}

pub fn analytics_with(db: &Surreal<Db>, config: &RelationConfig) -> Analytics {
    AnalyticsAggregator::new(
        SurrealRelationRepository::new(db.clone()),
        SurrealAccessLogRepository::new(db.clone()),
        SurrealErrorLogRepository::new(db.clone()),
        config,
    )
}

pub fn alice() -> Actor {
    Actor::user("alice")
}

pub fn request(from: &str, to: &str) -> CreateRelationRequest {
    CreateRelationRequest {
        from_org_id: Some(from.into()),
        to_org_id: Some(to.into()),
        relation_type: Some(RelationType::Collaborative),
        data_share_type: Some(DataShareType::ReadOnly),
        ..Default::default()
    }
}

pub async fn pending(fx: &Fixture, from: &str, to: &str) -> OrganizationRelation {
    fx.manager.create(request(from, to), &alice()).await.unwrap()
}

/// A relation both sides have approved.
pub async fn active(fx: &Fixture, from: &str, to: &str) -> OrganizationRelation {
    let rel = pending(fx, from, to).await;
    fx.manager.approve(rel.id, from, &alice()).await.unwrap();
    fx.manager.approve(rel.id, to, &alice()).await.unwrap()
}

pub fn assert_consent_invariant(rel: &OrganizationRelation) {
    use orglink_core::models::relation::RelationStatus;
    if rel.status == RelationStatus::Active {
        assert!(rel.approved_by_from_org && rel.approved_by_to_org);
    }
    if rel.status == RelationStatus::Pending {
        assert!(!(rel.approved_by_from_org && rel.approved_by_to_org));
    }
}
