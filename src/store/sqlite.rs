// src/store/sqlite.rs

//! SQLite-backed feature store.
//!
//! Conditional writes are a single `UPDATE ... WHERE status = ? AND
//! claimant IS ? RETURNING ...` statement, so the status check and the write
//! can never be separated by another writer.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::migrations;
use super::{CasOutcome, Expected, FeatureStore, StatusUpdate};
use crate::errors::{FeatureDagError, Result};
use crate::types::{Feature, FeatureId, FeatureStatus, NewFeature};

const DEFAULT_MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const FEATURE_COLUMNS: &str = "id, name, category, description, steps, priority, status, \
     dependencies, claimant, claimed_at, sequence, skip_count";

/// Connection settings for [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Database file, or `:memory:`.
    pub path: PathBuf,
    pub max_connections: u32,
}

impl SqliteStoreConfig {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// In-memory database; a single connection keeps it alive.
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    fn is_memory(&self) -> bool {
        self.path.to_string_lossy() == ":memory:"
    }
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    config: SqliteStoreConfig,
}

impl SqliteStore {
    /// Open (creating if needed) the database and apply migrations.
    pub async fn open(config: SqliteStoreConfig) -> Result<Self> {
        if !config.is_memory() {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let connection_str = if config.is_memory() {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", config.path.display())
        };

        let connect_options = SqliteConnectOptions::from_str(&connection_str)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .create_if_missing(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_memory() {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        }

        let pool = pool_options.connect_with(connect_options).await?;
        migrations::run_migrations(&pool).await?;

        debug!(path = ?config.path, "sqlite feature store opened");
        Ok(Self { pool, config })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::open(SqliteStoreConfig::in_memory()).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_feature(row: SqliteRow) -> Result<Feature> {
    let status: String = row.try_get("status")?;
    let status = FeatureStatus::from_str(&status).map_err(|e| anyhow!(e))?;
    let steps: String = row.try_get("steps")?;
    let dependencies: String = row.try_get("dependencies")?;
    let sequence: i64 = row.try_get("sequence")?;
    let skip_count: i64 = row.try_get("skip_count")?;
    let claimed_at: Option<DateTime<Utc>> = row.try_get("claimed_at")?;

    Ok(Feature {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        steps: serde_json::from_str(&steps)?,
        priority: row.try_get("priority")?,
        status,
        dependencies: serde_json::from_str(&dependencies)?,
        claimant: row.try_get("claimant")?,
        claimed_at,
        sequence: sequence as u64,
        skip_count: skip_count as u32,
    })
}

#[async_trait]
impl FeatureStore for SqliteStore {
    async fn insert_features(&self, features: Vec<NewFeature>) -> Result<Vec<Feature>> {
        let sql = format!(
            r#"
            INSERT INTO features (id, name, category, description, steps, priority, status, dependencies, sequence)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, (SELECT COALESCE(MAX(sequence), 0) + 1 FROM features)
            WHERE NOT EXISTS (SELECT 1 FROM features WHERE id = ?)
            RETURNING {FEATURE_COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        let mut stored = Vec::with_capacity(features.len());

        for f in features {
            let id = f.id;

            let result = sqlx::query(&sql)
                .bind(f.id)
                .bind(&f.name)
                .bind(&f.category)
                .bind(&f.description)
                .bind(serde_json::to_string(&f.steps)?)
                .bind(f.priority)
                .bind(f.status.as_str())
                .bind(serde_json::to_string(&f.dependencies)?)
                .bind(f.id)
                .fetch_optional(&mut *tx)
                .await;

            // Any early return drops `tx`, rolling the whole batch back.
            match result {
                Ok(Some(row)) => stored.push(row_to_feature(row)?),
                Ok(None) => return Err(FeatureDagError::DuplicateFeature { ids: vec![id] }),
                Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    return Err(FeatureDagError::DuplicateFeature { ids: vec![id] });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        debug!(count = stored.len(), "sqlite store: inserted features");
        Ok(stored)
    }

    async fn load_all(&self) -> Result<Vec<Feature>> {
        let rows = sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM features ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(row_to_feature).collect()
    }

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>> {
        let row = sqlx::query(&format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_feature).transpose()
    }

    async fn compare_and_set(
        &self,
        id: FeatureId,
        expected: &Expected,
        update: &StatusUpdate,
    ) -> Result<CasOutcome> {
        let sql = format!(
            r#"
            UPDATE features SET
                status = ?,
                claimant = ?,
                claimed_at = ?,
                sequence = CASE WHEN ? THEN (SELECT MAX(sequence) + 1 FROM features) ELSE sequence END,
                skip_count = skip_count + CASE WHEN ? THEN 1 ELSE 0 END
            WHERE id = ? AND status = ? AND claimant IS ?
            RETURNING {FEATURE_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(&update.claimant)
            .bind(update.claimed_at)
            .bind(update.requeue)
            .bind(update.requeue)
            .bind(id)
            .bind(expected.status.as_str())
            .bind(&expected.claimant)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(CasOutcome::Applied(row_to_feature(row)?)),
            None => Ok(CasOutcome::Conflict(self.get(id).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_feature_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert_features(vec![
                NewFeature::new(1, "schema")
                    .with_category("infra")
                    .with_steps(vec!["run migrations".into()])
                    .with_priority(2),
                NewFeature::new(2, "login").depends_on(1),
            ])
            .await
            .unwrap();

        let f2 = store.get(2).await.unwrap().unwrap();
        assert_eq!(f2.dependencies, vec![1]);
        assert_eq!(f2.status, FeatureStatus::Pending);
        assert_eq!(f2.sequence, 2);

        let f1 = store.get(1).await.unwrap().unwrap();
        assert_eq!(f1.category, "infra");
        assert_eq!(f1.steps, vec!["run migrations".to_string()]);
        assert!(store.get(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_batch_is_rolled_back() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.insert_features(vec![NewFeature::new(1, "a")]).await.unwrap();

        let err = store
            .insert_features(vec![NewFeature::new(2, "b"), NewFeature::new(1, "a")])
            .await
            .unwrap_err();
        assert!(matches!(err, FeatureDagError::DuplicateFeature { .. }));
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn claim_then_conflict_then_requeue() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .insert_features(vec![NewFeature::new(1, "a"), NewFeature::new(2, "b")])
            .await
            .unwrap();

        let now = Utc::now();
        let claim = StatusUpdate {
            status: FeatureStatus::InProgress,
            claimant: Some("w1".into()),
            claimed_at: Some(now),
            requeue: false,
        };

        let applied = store.compare_and_set(1, &Expected::pending(), &claim).await.unwrap();
        let CasOutcome::Applied(f) = applied else {
            panic!("first claim should apply");
        };
        assert_eq!(f.claimant.as_deref(), Some("w1"));
        assert!(f.claimed_at.is_some());

        let conflict = store.compare_and_set(1, &Expected::pending(), &claim).await.unwrap();
        assert!(matches!(conflict, CasOutcome::Conflict(Some(ref f)) if f.status == FeatureStatus::InProgress));

        let requeued = store
            .compare_and_set(1, &Expected::claimed_by("w1"), &StatusUpdate::requeue())
            .await
            .unwrap();
        let CasOutcome::Applied(f) = requeued else {
            panic!("claimant should be able to requeue");
        };
        assert_eq!(f.status, FeatureStatus::Pending);
        assert_eq!(f.claimant, None);
        assert_eq!(f.sequence, 3);
        assert_eq!(f.skip_count, 1);
    }
}
