// src/store/migrations.rs

//! Versioned SQLite schema for the feature table.

use sqlx::SqlitePool;

use crate::errors::Result;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Migration 1: feature table.
///
/// `steps` and `dependencies` hold JSON arrays. `sequence` is unique; new
/// values are always `MAX(sequence) + 1`, computed inside the writing
/// statement.
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS features (
        id INTEGER PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        category TEXT NOT NULL DEFAULT 'uncategorized',
        description TEXT NOT NULL DEFAULT '',
        steps TEXT NOT NULL DEFAULT '[]',
        priority INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'in_progress', 'done')),
        dependencies TEXT NOT NULL DEFAULT '[]',
        claimant TEXT,
        claimed_at TIMESTAMP,
        sequence INTEGER NOT NULL UNIQUE,
        skip_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_features_status ON features(status);
    CREATE INDEX IF NOT EXISTS idx_features_order ON features(priority, sequence);
"#;

async fn get_current_version(pool: &SqlitePool) -> Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;

    Ok(version.unwrap_or(0))
}

async fn record_migration(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT INTO _migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_current_version(pool).await?;

    tracing::info!(
        current_version = current_version,
        target_version = CURRENT_VERSION,
        "Checking feature store migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!("Feature store is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!("Applying migration v1: feature table");
        sqlx::raw_sql(MIGRATION_V1).execute(pool).await?;
        record_migration(pool, 1).await?;
    }

    tracing::info!("Feature store migrations completed");
    Ok(())
}
