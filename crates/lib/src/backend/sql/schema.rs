//! SQL schema definitions and version tracking.
//!
//! The schema is portable between SQLite and PostgreSQL.
//!
//! # Tables
//!
//! - `users`: one row per user, keyed by `user_id`
//! - `objects`: metadata of each stored configuration object, one row per
//!   `(owner_id, filename)`
//! - `object_chunks`: the object content split into numbered chunks
//!
//! # Versioning
//!
//! The version is recorded in `schema_version` on first initialization. A
//! database written by a newer release is refused rather than opened.

use crate::Result;
use crate::backend::errors::BackendError;

use super::{SqlDatabase, SqlxResultExt};

/// Current schema version.
///
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
pub const CREATE_TABLES: &[&str] = &[
    // BIGINT (64-bit) used for portability between SQLite and PostgreSQL
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    // Timestamps are milliseconds since the Unix epoch
    "CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY NOT NULL,
        email TEXT NOT NULL,
        name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL
    )",
    // The UNIQUE constraint is what makes insert-if-absent atomic
    "CREATE TABLE IF NOT EXISTS objects (
        id TEXT PRIMARY KEY NOT NULL,
        filename TEXT NOT NULL,
        owner_id TEXT NOT NULL,
        file_type BIGINT NOT NULL,
        length BIGINT NOT NULL,
        chunk_size BIGINT NOT NULL,
        sha256 TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        UNIQUE (owner_id, filename)
    )",
    // BYTEA is PostgreSQL binary type and SQLite maps it to BLOB affinity
    "CREATE TABLE IF NOT EXISTS object_chunks (
        object_id TEXT NOT NULL,
        n BIGINT NOT NULL,
        data BYTEA NOT NULL,
        PRIMARY KEY (object_id, n)
    )",
];

/// SQL statements to create indexes.
pub const CREATE_INDEXES: &[&str] =
    &["CREATE INDEX IF NOT EXISTS idx_objects_filename_owner ON objects(filename, owner_id)"];

/// Initialize the database schema.
///
/// Creates tables and indexes if they don't exist and records the schema
/// version. Fails if the database carries a newer version.
pub async fn initialize(db: &SqlDatabase) -> Result<()> {
    let pool = db.pool();

    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Schema creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .sql_context("Failed to check schema version")?;

    match row {
        None => {
            tracing::info!(version = SCHEMA_VERSION, "Initializing database schema");
            sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                .bind(SCHEMA_VERSION)
                .execute(pool)
                .await
                .sql_context("Failed to initialize schema version")?;
        }
        Some((current_version,)) if current_version > SCHEMA_VERSION => {
            return Err(BackendError::SqlxError {
                reason: format!(
                    "Database schema v{current_version} is newer than supported v{SCHEMA_VERSION}"
                ),
                source: None,
            }
            .into());
        }
        Some(_) => {}
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| BackendError::SqlxError {
                reason: format!("Index creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }

    Ok(())
}
