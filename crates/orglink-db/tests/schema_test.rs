//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use surrealdb_types::SurrealValue;

#[derive(Debug, SurrealValue)]
struct Applied {
    version: u32,
}

async fn fresh() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = fresh().await;
    orglink_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info_str = format!("{:?}", info.expect("INFO FOR DB should return a value"));

    for table in ["relation", "access_event", "error_event", "audit_log", "_migration"] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn rerunning_migrations_is_a_no_op() {
    let db = fresh().await;
    orglink_db::run_migrations(&db).await.unwrap();
    orglink_db::run_migrations(&db).await.unwrap();

    let applied: Vec<Applied> = db
        .query("SELECT version FROM _migration")
        .await
        .unwrap()
        .take(0)
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].version, 1);
}
