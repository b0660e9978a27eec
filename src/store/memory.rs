// src/store/memory.rs

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CasOutcome, Expected, FeatureStore, StatusUpdate};
use crate::errors::{FeatureDagError, Result};
use crate::types::{Feature, FeatureId, NewFeature};

/// Process-local store.
///
/// Each feature lives in its own `DashMap` entry, so a conditional write
/// only locks the shard holding that feature. Inserts are serialised among
/// themselves so that a batch is all-or-nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    features: DashMap<FeatureId, Feature>,
    last_sequence: AtomicU64,
    insert_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed raw records, keeping their status, claimant and sequence as-is.
    /// Meant for restoring a snapshot and for tests.
    pub fn with_features(features: Vec<Feature>) -> Self {
        let store = Self::default();
        let max_seq = features.iter().map(|f| f.sequence).max().unwrap_or(0);
        for f in features {
            store.features.insert(f.id, f);
        }
        store.last_sequence.store(max_seq, Ordering::SeqCst);
        store
    }

    /// Administrative removal. The scheduler itself never deletes features;
    /// dependents of a removed feature stay blocked.
    pub fn remove_feature(&self, id: FeatureId) -> Option<Feature> {
        self.features.remove(&id).map(|(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    fn next_sequence(&self) -> u64 {
        self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn insert_features(&self, features: Vec<NewFeature>) -> Result<Vec<Feature>> {
        let _guard = self.insert_lock.lock().await;

        let mut seen = HashSet::new();
        let mut dupes: Vec<FeatureId> = features
            .iter()
            .filter(|f| self.features.contains_key(&f.id) || !seen.insert(f.id))
            .map(|f| f.id)
            .collect();
        if !dupes.is_empty() {
            dupes.sort_unstable();
            dupes.dedup();
            return Err(FeatureDagError::DuplicateFeature { ids: dupes });
        }

        let stored: Vec<Feature> = features
            .into_iter()
            .map(|nf| {
                let mut f = nf.into_feature();
                f.sequence = self.next_sequence();
                f
            })
            .collect();

        for f in &stored {
            self.features.insert(f.id, f.clone());
        }

        debug!(count = stored.len(), "memory store: inserted features");
        Ok(stored)
    }

    async fn load_all(&self) -> Result<Vec<Feature>> {
        let mut all: Vec<Feature> = self.features.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|f| f.id);
        Ok(all)
    }

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>> {
        Ok(self.features.get(&id).map(|e| e.value().clone()))
    }

    async fn compare_and_set(
        &self,
        id: FeatureId,
        expected: &Expected,
        update: &StatusUpdate,
    ) -> Result<CasOutcome> {
        let Some(mut entry) = self.features.get_mut(&id) else {
            return Ok(CasOutcome::Conflict(None));
        };

        if !expected.matches(entry.value()) {
            return Ok(CasOutcome::Conflict(Some(entry.value().clone())));
        }

        update.apply(entry.value_mut(), || self.next_sequence());
        Ok(CasOutcome::Applied(entry.value().clone()))
    }
}
