#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use featuredag::engine::{ClaimOutcome, FeatureScheduler, SchedulerOptions};
use featuredag::store::{MemoryStore, SqliteStore, SqliteStoreConfig};
use featuredag::types::FeatureId;

pub use featuredag_test_utils::builders::{plain_options, record};
pub use featuredag_test_utils::{init_tracing, with_timeout, ConfigFileBuilder, GraphBuilder};

pub fn memory_scheduler(options: SchedulerOptions) -> FeatureScheduler<MemoryStore> {
    init_tracing();
    FeatureScheduler::new(Arc::new(MemoryStore::new()), options)
}

pub async fn sqlite_scheduler(
    db: &Path,
    options: SchedulerOptions,
) -> FeatureScheduler<SqliteStore> {
    init_tracing();
    let store = SqliteStore::open(SqliteStoreConfig::with_path(db))
        .await
        .expect("open sqlite store");
    FeatureScheduler::new(Arc::new(store), options)
}

/// Id of the claimed feature; panics on `NoEligibleFeature`.
pub fn claimed(outcome: ClaimOutcome) -> FeatureId {
    match outcome {
        ClaimOutcome::Claimed(f) => f.id,
        ClaimOutcome::NoEligibleFeature => panic!("expected a claim, got NoEligibleFeature"),
    }
}
