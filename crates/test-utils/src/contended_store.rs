use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tracing::debug;

use featuredag::errors::Result;
use featuredag::store::{CasOutcome, Expected, FeatureStore, StatusUpdate};
use featuredag::types::{Feature, FeatureId, NewFeature};

/// A store wrapper that simulates losing claim races:
/// - the first `conflicts` calls to `compare_and_set` report a conflict
///   without writing anything
/// - every call is counted, so tests can assert how often the scheduler
///   retried.
#[derive(Debug)]
pub struct ContendedStore<S> {
    inner: S,
    remaining_conflicts: AtomicU32,
    cas_calls: AtomicU32,
}

impl<S: FeatureStore> ContendedStore<S> {
    pub fn new(inner: S, conflicts: u32) -> Self {
        Self {
            inner,
            remaining_conflicts: AtomicU32::new(conflicts),
            cas_calls: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cas_calls(&self) -> u32 {
        self.cas_calls.load(Ordering::SeqCst)
    }

    fn take_conflict(&self) -> bool {
        self.remaining_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<S: FeatureStore> FeatureStore for ContendedStore<S> {
    async fn insert_features(&self, features: Vec<NewFeature>) -> Result<Vec<Feature>> {
        self.inner.insert_features(features).await
    }

    async fn load_all(&self) -> Result<Vec<Feature>> {
        self.inner.load_all().await
    }

    async fn get(&self, id: FeatureId) -> Result<Option<Feature>> {
        self.inner.get(id).await
    }

    async fn compare_and_set(
        &self,
        id: FeatureId,
        expected: &Expected,
        update: &StatusUpdate,
    ) -> Result<CasOutcome> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);

        if self.take_conflict() {
            debug!(feature = id, "injected conflict");
            return Ok(CasOutcome::Conflict(self.inner.get(id).await?));
        }

        self.inner.compare_and_set(id, expected, update).await
    }
}
