//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation. The audit table is append-only:
//! update and delete permissions are disabled at the schema level.

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
-- Access requests
-- =======================================================================
DEFINE TABLE access_request SCHEMAFULL;
DEFINE FIELD requester_id ON TABLE access_request TYPE option<string>;
DEFINE FIELD created_by_admin ON TABLE access_request TYPE bool \
    DEFAULT false;
DEFINE FIELD created_by ON TABLE access_request TYPE option<string>;
DEFINE FIELD requester_name ON TABLE access_request TYPE string;
DEFINE FIELD national_id ON TABLE access_request TYPE string;
DEFINE FIELD email ON TABLE access_request TYPE string;
DEFINE FIELD phone ON TABLE access_request TYPE string;
DEFINE FIELD program ON TABLE access_request TYPE string;
DEFINE FIELD vehicle_plate ON TABLE access_request TYPE string;
DEFINE FIELD vehicle_model ON TABLE access_request TYPE string;
DEFINE FIELD vehicle_color ON TABLE access_request TYPE string;
DEFINE FIELD garage_location ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD modification_notes ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD vehicle_photo ON TABLE access_request TYPE option<string>;
DEFINE FIELD document_photo ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD status ON TABLE access_request TYPE string \
    ASSERT $value IN ['pending', 'level1_approved', 'level2_approved', \
    'approved', 'rejected'];
DEFINE FIELD level1_approved ON TABLE access_request TYPE bool \
    DEFAULT false;
DEFINE FIELD level1_approved_by ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD level1_approved_at ON TABLE access_request \
    TYPE option<datetime>;
DEFINE FIELD level1_comments ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD level2_approved ON TABLE access_request TYPE bool \
    DEFAULT false;
DEFINE FIELD level2_approved_by ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD level2_approved_at ON TABLE access_request \
    TYPE option<datetime>;
DEFINE FIELD level2_comments ON TABLE access_request \
    TYPE option<string>;
DEFINE FIELD denial_reason ON TABLE access_request TYPE option<string>;
DEFINE FIELD denied_by_level ON TABLE access_request \
    TYPE option<string> ASSERT $value = NONE OR $value IN ['level1', \
    'level2'];
DEFINE FIELD denied_by ON TABLE access_request TYPE option<string>;
DEFINE FIELD denied_at ON TABLE access_request TYPE option<datetime>;
DEFINE FIELD version ON TABLE access_request TYPE int DEFAULT 1;
DEFINE FIELD created_at ON TABLE access_request TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE access_request TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_request_status ON TABLE access_request \
    COLUMNS status, created_at;
DEFINE INDEX idx_request_requester ON TABLE access_request \
    COLUMNS requester_id;

-- =======================================================================
-- Credentials (at most one active per request)
-- =======================================================================
DEFINE TABLE credential SCHEMAFULL;
DEFINE FIELD request_id ON TABLE credential TYPE string;
DEFINE FIELD payload ON TABLE credential TYPE string;
DEFINE FIELD image_ref ON TABLE credential TYPE string;
DEFINE FIELD document_ref ON TABLE credential TYPE string;
DEFINE FIELD active ON TABLE credential TYPE bool DEFAULT true;
DEFINE FIELD issued_at ON TABLE credential TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD expires_at ON TABLE credential TYPE option<datetime>;
DEFINE INDEX idx_credential_request ON TABLE credential \
    COLUMNS request_id, active;

-- =======================================================================
-- Audit ledger (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD kind ON TABLE audit_log TYPE string \
    ASSERT $value IN ['request_created', 'request_approved_level1', \
    'request_approved_level2', 'request_rejected', 'request_deleted', \
    'credential_issued', 'credential_regenerated', \
    'credential_scan_success', 'credential_scan_failed', \
    'user_created', 'user_role_changed', 'user_status_changed', \
    'user_deleted', 'password_changed'];
DEFINE FIELD description ON TABLE audit_log TYPE string;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_name ON TABLE audit_log TYPE string;
DEFINE FIELD target_user_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD target_request_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD target_description ON TABLE audit_log \
    TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_kind_time ON TABLE audit_log \
    COLUMNS kind, timestamp;
DEFINE INDEX idx_audit_actor ON TABLE audit_log COLUMNS actor_id;
DEFINE INDEX idx_audit_target_request ON TABLE audit_log \
    COLUMNS target_request_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
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

            // Record the applied migration.
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
///
/// Exposed for testing with in-memory SurrealDB instances that
/// bypass the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}
