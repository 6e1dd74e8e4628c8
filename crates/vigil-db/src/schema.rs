//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

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

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "identity_and_access",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "device_trust",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1: users, roles, grants, page overrides, sessions, audit
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD full_name ON TABLE user TYPE string;
DEFINE FIELD badge_number ON TABLE user TYPE option<string>;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD status ON TABLE user TYPE string \
    ASSERT $value IN ['Active', 'Inactive', 'Suspended'];
DEFINE FIELD biometric_enabled ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD max_devices ON TABLE user TYPE int DEFAULT 3 \
    ASSERT $value = -1 OR ($value >= 1 AND $value <= 999);
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Role tags (admin/officer/user hierarchy + department tags)
-- =======================================================================
DEFINE TABLE user_role SCHEMAFULL;
DEFINE FIELD user_id ON TABLE user_role TYPE string;
DEFINE FIELD role ON TABLE user_role TYPE string \
    ASSERT $value IN ['admin', 'officer', 'user', 'traffic_police', \
    'cid', 'cybercrime', 'forensics', 'intelligence', 'crime_records'];
DEFINE FIELD created_at ON TABLE user_role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_role_unique ON TABLE user_role \
    COLUMNS user_id, role UNIQUE;

-- =======================================================================
-- Department grants (time-boxed, independent of user_role)
-- =======================================================================
DEFINE TABLE department_grant SCHEMAFULL;
DEFINE FIELD user_id ON TABLE department_grant TYPE string;
DEFINE FIELD department ON TABLE department_grant TYPE string;
DEFINE FIELD is_active ON TABLE department_grant TYPE bool DEFAULT true;
DEFINE FIELD granted_by ON TABLE department_grant TYPE option<string>;
DEFINE FIELD expires_at ON TABLE department_grant TYPE option<datetime>;
DEFINE FIELD created_at ON TABLE department_grant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_grant_user_department ON TABLE department_grant \
    COLUMNS user_id, department;

-- =======================================================================
-- Per-page access overrides
-- =======================================================================
DEFINE TABLE page_permission SCHEMAFULL;
DEFINE FIELD user_id ON TABLE page_permission TYPE string;
DEFINE FIELD page_path ON TABLE page_permission TYPE string;
DEFINE FIELD can_access ON TABLE page_permission TYPE bool;
DEFINE FIELD updated_at ON TABLE page_permission TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_page_permission_unique ON TABLE page_permission \
    COLUMNS user_id, page_path UNIQUE;

-- =======================================================================
-- Sessions (bound to the device they were admitted on)
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD device_id ON TABLE session TYPE string;
DEFINE FIELD token_hash ON TABLE session TYPE string;
DEFINE FIELD ip_address ON TABLE session TYPE option<string>;
DEFINE FIELD user_agent ON TABLE session TYPE option<string>;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_token ON TABLE session \
    COLUMNS token_hash UNIQUE;
DEFINE INDEX idx_session_user ON TABLE session COLUMNS user_id;
DEFINE INDEX idx_session_device ON TABLE session COLUMNS device_id;

-- =======================================================================
-- Audit Log (append-only)
-- =======================================================================
DEFINE TABLE audit_log SCHEMAFULL
    PERMISSIONS
        FOR create FULL
        FOR select FULL
        FOR update NONE
        FOR delete NONE;
DEFINE FIELD actor_id ON TABLE audit_log TYPE string;
DEFINE FIELD actor_type ON TABLE audit_log TYPE string \
    ASSERT $value IN ['User', 'System'];
DEFINE FIELD action ON TABLE audit_log TYPE string;
DEFINE FIELD subject_id ON TABLE audit_log TYPE option<string>;
DEFINE FIELD outcome ON TABLE audit_log TYPE string \
    ASSERT $value IN ['Success', 'Failure', 'Denied'];
DEFINE FIELD ip_address ON TABLE audit_log TYPE option<string>;
DEFINE FIELD metadata ON TABLE audit_log TYPE object FLEXIBLE \
    DEFAULT {};
DEFINE FIELD timestamp ON TABLE audit_log TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_audit_time ON TABLE audit_log COLUMNS timestamp;
DEFINE INDEX idx_audit_actor ON TABLE audit_log COLUMNS actor_id;
";

// -----------------------------------------------------------------------
// Schema v2: device registry, blocked attempts, suspicious logins
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Known devices per user
-- =======================================================================
DEFINE TABLE device SCHEMAFULL;
DEFINE FIELD user_id ON TABLE device TYPE string;
DEFINE FIELD fingerprint ON TABLE device TYPE string;
DEFINE FIELD label ON TABLE device TYPE string;
DEFINE FIELD device_info ON TABLE device TYPE object FLEXIBLE;
DEFINE FIELD is_active ON TABLE device TYPE bool DEFAULT true;
DEFINE FIELD is_primary ON TABLE device TYPE bool DEFAULT false;
DEFINE FIELD first_seen_at ON TABLE device TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD last_seen_at ON TABLE device TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD login_count ON TABLE device TYPE int DEFAULT 1;
DEFINE FIELD notes ON TABLE device TYPE option<string>;
DEFINE INDEX idx_device_user_fingerprint ON TABLE device \
    COLUMNS user_id, fingerprint UNIQUE;

-- =======================================================================
-- Logins held back by the device ceiling
-- =======================================================================
DEFINE TABLE blocked_attempt SCHEMAFULL;
DEFINE FIELD user_id ON TABLE blocked_attempt TYPE string;
DEFINE FIELD user_email ON TABLE blocked_attempt TYPE string;
DEFINE FIELD user_name ON TABLE blocked_attempt TYPE string;
DEFINE FIELD fingerprint ON TABLE blocked_attempt TYPE string;
DEFINE FIELD device_info ON TABLE blocked_attempt TYPE object FLEXIBLE;
DEFINE FIELD reason ON TABLE blocked_attempt TYPE string;
DEFINE FIELD status ON TABLE blocked_attempt TYPE string \
    ASSERT $value IN ['Pending', 'Approved', 'Blacklisted'];
DEFINE FIELD resolved_by ON TABLE blocked_attempt TYPE option<string>;
DEFINE FIELD resolved_at ON TABLE blocked_attempt TYPE option<datetime>;
DEFINE FIELD notes ON TABLE blocked_attempt TYPE option<string>;
DEFINE FIELD created_at ON TABLE blocked_attempt TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_blocked_user_fingerprint ON TABLE blocked_attempt \
    COLUMNS user_id, fingerprint;
DEFINE INDEX idx_blocked_status ON TABLE blocked_attempt COLUMNS status;

-- =======================================================================
-- Geolocation audit trail
-- =======================================================================
DEFINE TABLE suspicious_login SCHEMAFULL;
DEFINE FIELD user_id ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD email ON TABLE suspicious_login TYPE string;
DEFINE FIELD ip_address ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD country ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD country_code ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD city ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD latitude ON TABLE suspicious_login TYPE option<float>;
DEFINE FIELD longitude ON TABLE suspicious_login TYPE option<float>;
DEFINE FIELD user_agent ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD blocked ON TABLE suspicious_login TYPE bool;
DEFINE FIELD severity ON TABLE suspicious_login TYPE string \
    ASSERT $value IN ['Low', 'Medium', 'High', 'Critical'];
DEFINE FIELD status ON TABLE suspicious_login TYPE string \
    ASSERT $value IN ['Open', 'Investigating', 'Resolved', \
    'FalsePositive'];
DEFINE FIELD notes ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD error ON TABLE suspicious_login TYPE option<string>;
DEFINE FIELD attempted_at ON TABLE suspicious_login TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_suspicious_time ON TABLE suspicious_login \
    COLUMNS attempted_at;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
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
        if migration.version <= current_version {
            continue;
        }

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
    }

    Ok(())
}

/// Highest migration version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
