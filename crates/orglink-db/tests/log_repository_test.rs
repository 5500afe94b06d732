//! Integration tests for the append-only access, error and audit logs.

use chrono::{Duration, Utc};
use orglink_core::error::OrgLinkError;
use orglink_core::models::analytics::{CreateAccessEvent, CreateErrorEvent};
use orglink_core::models::audit::{Actor, ActorKind, CreateAuditLogEntry};
use orglink_core::models::relation::{
    CreateRelation, DataShareType, Priority, RelationPermissions, RelationStatus, RelationType,
    SharedData,
};
use orglink_core::repository::{
    AccessLogRepository, AuditLogFilter, AuditLogRepository, ErrorLogRepository, Pagination,
    RelationRepository,
};
use orglink_db::repository::{
    SurrealAccessLogRepository, SurrealAuditLogRepository, SurrealErrorLogRepository,
    SurrealRelationRepository,
};
use tokio::task::JoinSet;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use uuid::Uuid;

async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orglink_db::run_migrations(&db).await.unwrap();
    db
}

fn access(relation_id: Uuid, minutes_ago: i64, success: bool) -> CreateAccessEvent {
    CreateAccessEvent {
        relation_id,
        action: "read".into(),
        success,
        response_time_ms: 120,
        data_type: "registry".into(),
        occurred_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

async fn stored_relation(db: &Surreal<surrealdb::engine::local::Db>) -> Uuid {
    SurrealRelationRepository::new(db.clone())
        .create(CreateRelation {
            from_org_id: "ORG_A".into(),
            to_org_id: "ORG_B".into(),
            relation_type: RelationType::Collaborative,
            data_share_type: DataShareType::ReadOnly,
            shared_data: SharedData::default(),
            permissions: RelationPermissions::default(),
            priority: Priority::Medium,
            notes: None,
            end_date: None,
            created_by: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn access_events_are_listed_oldest_first() {
    let db = setup().await;
    let repo = SurrealAccessLogRepository::new(db);
    let rel = Uuid::new_v4();

    repo.append(access(rel, 5, true)).await.unwrap();
    repo.append(access(rel, 30, false)).await.unwrap();
    repo.append(access(Uuid::new_v4(), 1, true)).await.unwrap();

    let events = repo.list_by_relation(rel, None).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].occurred_at < events[1].occurred_at);
    assert!(!events[0].success);
    assert_eq!(events[1].data_type, "registry");
}

#[tokio::test]
async fn access_events_respect_since() {
    let db = setup().await;
    let repo = SurrealAccessLogRepository::new(db);
    let rel = Uuid::new_v4();

    repo.append(access(rel, 60 * 24 * 40, true)).await.unwrap();
    repo.append(access(rel, 10, true)).await.unwrap();

    let since = Utc::now() - Duration::days(30);
    let recent = repo.list_by_relation(rel, Some(since)).await.unwrap();
    assert_eq!(recent.len(), 1);
}

#[tokio::test]
async fn error_events_are_kept_separately() {
    let db = setup().await;
    let errors = SurrealErrorLogRepository::new(db.clone());
    let accesses = SurrealAccessLogRepository::new(db);
    let rel = Uuid::new_v4();

    let recorded = errors
        .append(CreateErrorEvent {
            relation_id: rel,
            description: "partner endpoint timed out".into(),
            attempts: 3,
            occurred_at: Utc::now(),
        })
        .await
        .unwrap();
    assert_eq!(recorded.attempts, 3);

    let listed = errors.list_by_relation(rel, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "partner endpoint timed out");
    assert!(accesses.list_by_relation(rel, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_entries_round_trip_actor_and_statuses() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);
    let rel = Uuid::new_v4();

    let entry = repo
        .append(CreateAuditLogEntry {
            relation_id: rel,
            actor: Actor::system(),
            action: "relation.expire".into(),
            from_status: Some(RelationStatus::Active),
            to_status: Some(RelationStatus::Expired),
            reason: Some("end date reached".into()),
            metadata: None,
        })
        .await
        .unwrap();

    assert_eq!(entry.actor_kind, ActorKind::System);
    assert_eq!(entry.from_status, Some(RelationStatus::Active));
    assert_eq!(entry.to_status, Some(RelationStatus::Expired));
    assert!(entry.metadata.is_object());
}

#[tokio::test]
async fn audit_list_filters_and_orders_newest_first() {
    let db = setup().await;
    let repo = SurrealAuditLogRepository::new(db);
    let rel = Uuid::new_v4();

    for action in ["relation.create", "relation.approve", "relation.approve"] {
        repo.append(CreateAuditLogEntry {
            relation_id: rel,
            actor: Actor::user("alice"),
            action: action.into(),
            from_status: None,
            to_status: None,
            reason: None,
            metadata: Some(serde_json::json!({ "org": "ORG_A" })),
        })
        .await
        .unwrap();
    }
    repo.append(CreateAuditLogEntry {
        relation_id: Uuid::new_v4(),
        actor: Actor::user("bob"),
        action: "relation.create".into(),
        from_status: None,
        to_status: Some(RelationStatus::Pending),
        reason: None,
        metadata: None,
    })
    .await
    .unwrap();

    let for_relation = repo
        .list(
            AuditLogFilter {
                relation_id: Some(rel),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(for_relation.total, 3);
    assert!(for_relation.items[0].timestamp >= for_relation.items[2].timestamp);

    let approvals = repo
        .list(
            AuditLogFilter {
                relation_id: Some(rel),
                action: Some("relation.approve".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(approvals.total, 2);

    let by_bob = repo
        .list(
            AuditLogFilter {
                actor_id: Some("bob".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(by_bob.total, 1);
}

#[tokio::test]
async fn access_append_advances_counters_without_bumping_version() {
    let db = setup().await;
    let rel = stored_relation(&db).await;
    let relations = SurrealRelationRepository::new(db.clone());
    let log = SurrealAccessLogRepository::new(db);

    let newer = log.append(access(rel, 5, true)).await.unwrap();
    let after_first = relations.get_by_id(rel).await.unwrap();
    assert_eq!(after_first.access_count, 1);
    assert_eq!(after_first.version, 0);

    // An older event counts but does not rewind the timestamp.
    log.append(access(rel, 90, false)).await.unwrap();
    let after_second = relations.get_by_id(rel).await.unwrap();
    assert_eq!(after_second.access_count, 2);
    let last = after_second.last_accessed_at.unwrap();
    assert!((last - newer.occurred_at).num_milliseconds().abs() < 1);
}

#[tokio::test]
async fn concurrent_access_appends_keep_log_and_counter_equal() {
    let db = setup().await;
    let rel = stored_relation(&db).await;
    let log = SurrealAccessLogRepository::new(db.clone());

    let mut tasks = JoinSet::new();
    for i in 0..40 {
        let log = log.clone();
        tasks.spawn(async move { log.append(access(rel, i, true)).await });
    }

    let mut committed = 0u64;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            Ok(_) => committed += 1,
            Err(err) => assert!(
                matches!(err, OrgLinkError::Conflict { .. }),
                "unexpected failure: {err}"
            ),
        }
    }

    let logged = log.list_by_relation(rel, None).await.unwrap().len() as u64;
    let counted = SurrealRelationRepository::new(db)
        .get_by_id(rel)
        .await
        .unwrap()
        .access_count;
    assert!(committed > 0);
    assert_eq!(logged, committed);
    assert_eq!(counted, committed);
}
