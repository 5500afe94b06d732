//! Integration tests for the connectivity probe over a stored relation.

mod common;

use std::time::Duration;

use common::*;
use orglink_core::error::OrgLinkError;
use orglink_db::repository::SurrealRelationRepository;
use orglink_relations::probe::{DeclaredProbe, ScriptedProbe};
use orglink_relations::{ConnectivityProbe, RelationConfig, StageStatus};
use uuid::Uuid;

#[tokio::test]
async fn declared_probe_passes_an_active_relation() {
    let fx = setup().await;
    let rel = active(&fx, "ORG_A", "ORG_B").await;
    let probe = ConnectivityProbe::new(
        SurrealRelationRepository::new(fx.db.clone()),
        DeclaredProbe,
        &RelationConfig::default(),
    );

    let report = probe.probe(rel.id).await.unwrap();
    assert_eq!(report.overall, StageStatus::Success);
    assert_eq!(report.relation_id, rel.id);
}

#[tokio::test]
async fn pending_relation_fails_connectivity_and_skips_the_rest() {
    let fx = setup().await;
    let rel = pending(&fx, "ORG_A", "ORG_B").await;
    let probe = ConnectivityProbe::new(
        SurrealRelationRepository::new(fx.db.clone()),
        DeclaredProbe,
        &RelationConfig::default(),
    );

    let report = probe.probe(rel.id).await.unwrap();
    assert_eq!(report.connection_test.status, StageStatus::Error);
    for stage in [
        &report.authentication_test,
        &report.permissions_test,
        &report.data_access_test,
    ] {
        assert_eq!(stage.status, StageStatus::Skipped);
    }
    assert_eq!(report.overall, StageStatus::Error);
}

#[tokio::test]
async fn probing_never_mutates_the_relation() {
    let fx = setup().await;
    let rel = active(&fx, "ORG_A", "ORG_B").await;
    let probe = ConnectivityProbe::new(
        SurrealRelationRepository::new(fx.db.clone()),
        ScriptedProbe::healthy().with_latency(Duration::from_secs(3)),
        &RelationConfig::default(),
    );

    let report = probe.probe(rel.id).await.unwrap();
    assert_eq!(report.overall, StageStatus::Error);
    assert_eq!(fx.manager.get(rel.id).await.unwrap(), rel);
}

#[tokio::test]
async fn unknown_relation_is_a_genuine_error() {
    let fx = setup().await;
    let probe = ConnectivityProbe::new(
        SurrealRelationRepository::new(fx.db.clone()),
        DeclaredProbe,
        &RelationConfig::default(),
    );

    let err = probe.probe(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, OrgLinkError::NotFound { .. }));
}
