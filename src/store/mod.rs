// src/store/mod.rs

//! Persistence contract for features.
//!
//! The store is the single source of truth for feature status. Everything
//! the scheduler knows about readiness is derived from [`FeatureStore::load_all`].
//! The only mutation after ingestion is [`FeatureStore::compare_and_set`], a
//! conditional write that lands only if the feature still has the expected
//! status and claimant.
//!
//! - [`memory`] keeps features in a sharded concurrent map (tests, `--db :memory:`).
//! - [`sqlite`] persists them in a SQLite database via `sqlx`.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::types::{Feature, FeatureId, FeatureStatus, NewFeature, WorkerId};

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SqliteStoreConfig};

/// Precondition of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expected {
    pub status: FeatureStatus,
    pub claimant: Option<WorkerId>,
}

impl Expected {
    pub fn pending() -> Self {
        Self {
            status: FeatureStatus::Pending,
            claimant: None,
        }
    }

    pub fn claimed_by(worker: &str) -> Self {
        Self {
            status: FeatureStatus::InProgress,
            claimant: Some(worker.to_string()),
        }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        feature.status == self.status && feature.claimant == self.claimant
    }
}

/// New values written when the precondition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: FeatureStatus,
    pub claimant: Option<WorkerId>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Assign a fresh sequence number (larger than any issued so far) and
    /// bump `skip_count`.
    pub requeue: bool,
}

impl StatusUpdate {
    /// Back to pending, unclaimed, behind every current peer.
    pub fn requeue() -> Self {
        Self {
            status: FeatureStatus::Pending,
            claimant: None,
            claimed_at: None,
            requeue: true,
        }
    }

    /// Apply to an in-memory record. `next_sequence` is only used when
    /// `requeue` is set.
    pub fn apply(&self, feature: &mut Feature, next_sequence: impl FnOnce() -> u64) {
        feature.status = self.status;
        feature.claimant = self.claimant.clone();
        feature.claimed_at = self.claimed_at;
        if self.requeue {
            feature.sequence = next_sequence();
            feature.skip_count += 1;
        }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The write landed; carries the updated record.
    Applied(Feature),
    /// The precondition failed; carries the current record, or `None` if
    /// the feature does not exist.
    Conflict(Option<Feature>),
}

#[async_trait]
pub trait FeatureStore: Send + Sync + Debug {
    /// Insert a batch atomically, assigning increasing sequence numbers in
    /// batch order. Returns the stored records.
    async fn insert_features(&self, features: Vec<NewFeature>) -> Result<Vec<Feature>>;

    /// Every stored feature, ordered by id.
    async fn load_all(&self) -> Result<Vec<Feature>>;

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>>;

    /// Apply `update` to feature `id` only if it currently matches
    /// `expected`.
    async fn compare_and_set(
        &self,
        id: FeatureId,
        expected: &Expected,
        update: &StatusUpdate,
    ) -> Result<CasOutcome>;
}

#[async_trait]
impl<S: FeatureStore + ?Sized> FeatureStore for Arc<S> {
    async fn insert_features(&self, features: Vec<NewFeature>) -> Result<Vec<Feature>> {
        (**self).insert_features(features).await
    }

    async fn load_all(&self) -> Result<Vec<Feature>> {
        (**self).load_all().await
    }

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>> {
        (**self).get(id).await
    }

    async fn compare_and_set(
        &self,
        id: FeatureId,
        expected: &Expected,
        update: &StatusUpdate,
    ) -> Result<CasOutcome> {
        (**self).compare_and_set(id, expected, update).await
    }
}
