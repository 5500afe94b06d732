//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as their wire strings
//! with ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organization relations
-- =======================================================================
DEFINE TABLE relation SCHEMAFULL;
DEFINE FIELD from_org_id ON TABLE relation TYPE string;
DEFINE FIELD to_org_id ON TABLE relation TYPE string;
DEFINE FIELD relation_type ON TABLE relation TYPE string \
    ASSERT $value IN ['HIERARCHICAL', 'COLLABORATIVE', 'INFORMATIONAL'];
DEFINE FIELD data_share_type ON TABLE relation TYPE string \
    ASSERT $value IN ['READ_ONLY', 'READ_WRITE', 'FULL', 'CUSTOM'];
DEFINE FIELD status ON TABLE relation TYPE string \
    ASSERT $value IN ['PENDING', 'ACTIVE', 'SUSPENDED', 'EXPIRED', \
    'REVOKED'];
DEFINE FIELD approved_by_from_org ON TABLE relation TYPE bool \
    DEFAULT false;
DEFINE FIELD approved_by_to_org ON TABLE relation TYPE bool \
    DEFAULT false;
DEFINE FIELD shared_data ON TABLE relation TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD permissions ON TABLE relation TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD priority ON TABLE relation TYPE string \
    ASSERT $value IN ['LOW', 'MEDIUM', 'HIGH', 'URGENT'];
DEFINE FIELD notes ON TABLE relation TYPE option<string>;
DEFINE FIELD status_reason ON TABLE relation TYPE option<string>;
DEFINE FIELD created_by ON TABLE relation TYPE option<string>;
DEFINE FIELD end_date ON TABLE relation TYPE option<datetime>;
DEFINE FIELD access_count ON TABLE relation TYPE int DEFAULT 0;
DEFINE FIELD last_accessed_at ON TABLE relation TYPE option<datetime>;
DEFINE FIELD version ON TABLE relation TYPE int DEFAULT 0;
DEFINE FIELD created_at ON TABLE relation TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE relation TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_relation_from_org ON TABLE relation COLUMNS from_org_id;
DEFINE INDEX idx_relation_to_org ON TABLE relation COLUMNS to_org_id;
DEFINE INDEX idx_relation_status ON TABLE relation COLUMNS status;

-- =======================================================================
-- Access log (append-only)
-- =======================================================================
DEFINE TABLE access_event SCHEMAFULL;
DEFINE FIELD relation_id ON TABLE access_event TYPE string;
DEFINE FIELD action ON TABLE access_event TYPE string;
DEFINE FIELD success ON TABLE access_event TYPE bool;
DEFINE FIELD response_time_ms ON TABLE access_event TYPE int;
DEFINE FIELD data_type ON TABLE access_event TYPE string;
DEFINE FIELD occurred_at ON TABLE access_event TYPE datetime;
DEFINE INDEX idx_access_event_relation ON TABLE access_event \
    COLUMNS relation_id, occurred_at;

-- =======================================================================
-- Error log (append-only, separate from the access log)
-- =======================================================================
DEFINE TABLE error_event SCHEMAFULL;
DEFINE FIELD relation_id ON TABLE error_event TYPE string;
DEFINE FIELD description ON TABLE error_event TYPE string;
DEFINE FIELD attempts ON TABLE error_event TYPE int;
DEFINE FIELD occurred_at ON TABLE error_event TYPE datetime;
DEFINE INDEX idx_error_event_relation ON TABLE error_event \
    COLUMNS relation_id, occurred_at;

-- =======================================================================
-- Audit log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL;
DEFINE FIELD relation_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_kind ON TABLE audit_log TYPE string \
    ASSERT $value IN ['user', 'system'];
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD from_status ON TABLE audit_log TYPE option<string>;
DEFINE FIELD to_status ON TABLE audit_log TYPE option<string>;
DEFINE FIELD reason ON TABLE audit_log TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_log_relation ON TABLE audit_log \
    COLUMNS relation_id, timestamp;
";

/// Run all pending migrations against the database.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
