//! Integration tests for the relation repository using in-memory SurrealDB.

use chrono::{Duration, Utc};
use orglink_core::error::OrgLinkError;
use orglink_core::models::relation::{
    CreateRelation, DataShareType, Direction, Priority, RelationPermissions, RelationStatus,
    RelationType, SharedData, UpdateRelation,
};
use orglink_core::repository::{
    Pagination, RelationFilter, RelationRepository, UniquenessPolicy,
};
use orglink_db::repository::SurrealRelationRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<surrealdb::engine::local::Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    orglink_db::run_migrations(&db).await.unwrap();
    db
}

fn new_relation(from: &str, to: &str) -> CreateRelation {
    CreateRelation {
        from_org_id: from.into(),
        to_org_id: to.into(),
        relation_type: RelationType::Collaborative,
        data_share_type: DataShareType::ReadWrite,
        shared_data: SharedData {
            services: ["registry".to_string(), "payroll".to_string()].into(),
            ..Default::default()
        },
        permissions: RelationPermissions {
            write: true,
            ..Default::default()
        },
        priority: Priority::High,
        notes: Some("quarterly exchange".into()),
        end_date: None,
        created_by: Some("alice".into()),
    }
}

#[tokio::test]
async fn create_starts_pending_and_unapproved() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);

    let rel = repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();

    assert_eq!(rel.status, RelationStatus::Pending);
    assert!(!rel.approved_by_from_org);
    assert!(!rel.approved_by_to_org);
    assert_eq!(rel.access_count, 0);
    assert_eq!(rel.version, 0);
    assert!(rel.shared_data.services.contains("registry"));
    assert!(rel.permissions.write);
    assert_eq!(rel.priority, Priority::High);

    let fetched = repo.get_by_id(rel.id).await.unwrap();
    assert_eq!(fetched.id, rel.id);
    assert_eq!(fetched.from_org_id, "ORG_A");
    assert_eq!(fetched.notes.as_deref(), Some("quarterly exchange"));
}

#[tokio::test]
async fn get_missing_relation_is_not_found() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);

    let err = repo.get_by_id(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, OrgLinkError::NotFound { .. }));
}

#[tokio::test]
async fn update_bumps_version_and_rejects_stale_writers() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);
    let rel = repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();

    let updated = repo
        .update(
            rel.id,
            0,
            UpdateRelation {
                approved_by_from_org: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(updated.approved_by_from_org);
    assert_eq!(updated.version, 1);

    // A writer still holding version 0 must lose.
    let err = repo
        .update(
            rel.id,
            0,
            UpdateRelation {
                approved_by_to_org: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_retryable());

    let fetched = repo.get_by_id(rel.id).await.unwrap();
    assert!(!fetched.approved_by_to_org);
    assert_eq!(fetched.version, 1);
}

#[tokio::test]
async fn update_can_set_and_clear_status_reason() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);
    let rel = repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();

    let suspended = repo
        .update(
            rel.id,
            0,
            UpdateRelation {
                status: Some(RelationStatus::Suspended),
                status_reason: Some(Some("audit".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(suspended.status_reason.as_deref(), Some("audit"));

    let resumed = repo
        .update(
            rel.id,
            1,
            UpdateRelation {
                status: Some(RelationStatus::Active),
                status_reason: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resumed.status, RelationStatus::Active);
    assert!(resumed.status_reason.is_none());
}

#[tokio::test]
async fn update_missing_relation_is_not_found() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);

    let err = repo
        .update(uuid::Uuid::new_v4(), 0, UpdateRelation::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrgLinkError::NotFound { .. }));
}

#[tokio::test]
async fn list_filters_by_direction_and_status() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);

    let out = repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();
    let inc = repo.create(new_relation("ORG_C", "ORG_A")).await.unwrap();
    repo.create(new_relation("ORG_B", "ORG_C")).await.unwrap();

    let both = repo
        .list(
            RelationFilter {
                org_id: Some("ORG_A".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(both.total, 2);

    let outgoing = repo
        .list(
            RelationFilter {
                org_id: Some("ORG_A".into()),
                direction: Some(Direction::Outgoing),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(outgoing.total, 1);
    assert_eq!(outgoing.items[0].id, out.id);

    let incoming = repo
        .list(
            RelationFilter {
                org_id: Some("ORG_A".into()),
                direction: Some(Direction::Incoming),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(incoming.items[0].id, inc.id);

    let active = repo
        .list(
            RelationFilter {
                statuses: vec![RelationStatus::Active],
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(active.total, 0);
}

#[tokio::test]
async fn list_paginates() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);
    for i in 0..5 {
        repo.create(new_relation("ORG_A", &format!("ORG_{i}")))
            .await
            .unwrap();
    }

    let page = repo
        .list(
            RelationFilter::default(),
            Pagination {
                offset: 2,
                limit: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.offset, 2);
}

#[tokio::test]
async fn list_filters_by_end_date() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);
    let now = Utc::now();

    let mut past = new_relation("ORG_A", "ORG_B");
    past.end_date = Some(now - Duration::days(1));
    let past = repo.create(past).await.unwrap();

    let mut future = new_relation("ORG_A", "ORG_C");
    future.end_date = Some(now + Duration::days(30));
    repo.create(future).await.unwrap();
    repo.create(new_relation("ORG_A", "ORG_D")).await.unwrap();

    let due = repo
        .list(
            RelationFilter {
                end_date_before: Some(now),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(due.total, 1);
    assert_eq!(due.items[0].id, past.id);
}

#[tokio::test]
async fn duplicates_allowed_by_default() {
    let db = setup().await;
    let repo = SurrealRelationRepository::new(db);

    repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();
    repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();
}

#[tokio::test]
async fn per_type_uniqueness_rejects_live_duplicate() {
    let db = setup().await;
    let repo = SurrealRelationRepository::with_uniqueness(db, UniquenessPolicy::PerRelationType);

    let first = repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();
    let err = repo
        .create(new_relation("ORG_A", "ORG_B"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrgLinkError::Conflict { .. }));

    // Another type for the same pair is fine.
    let mut other = new_relation("ORG_A", "ORG_B");
    other.relation_type = RelationType::Informational;
    repo.create(other).await.unwrap();

    // Once the first is terminal, the pair is free again.
    repo.update(
        first.id,
        0,
        UpdateRelation {
            status: Some(RelationStatus::Revoked),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    repo.create(new_relation("ORG_A", "ORG_B")).await.unwrap();
}
