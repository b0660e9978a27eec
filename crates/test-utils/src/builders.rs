#![allow(dead_code)]

use std::path::PathBuf;

use featuredag::config::{ConfigFile, RawConfigFile};
use featuredag::dag::OrderingPolicy;
use featuredag::engine::SchedulerOptions;
use featuredag::types::{
    DependencyEdge, Feature, FeatureId, FeatureStatus, InfraBand, InfraPolicy, NewFeature,
    StoreBackend,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn max_claim_attempts(mut self, attempts: u32) -> Self {
        self.config.scheduler.max_claim_attempts = attempts;
        self
    }

    pub fn infra_policy(mut self, policy: InfraPolicy) -> Self {
        self.config.scheduler.infra_policy = policy;
        self
    }

    pub fn infra_band(mut self, first: FeatureId, last: FeatureId) -> Self {
        self.config.scheduler.infra_band = [first, last];
        self
    }

    pub fn memory_backend(mut self) -> Self {
        self.config.store.backend = StoreBackend::Memory;
        self
    }

    pub fn sqlite_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.store.backend = StoreBackend::Sqlite;
        self.config.store.path = path.into();
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Scheduler options as the CLI would derive them.
    pub fn options(self) -> SchedulerOptions {
        self.build().to_scheduler_options()
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Options with the infra band switched off, for tests about plain
/// priority/sequence ordering.
pub fn plain_options() -> SchedulerOptions {
    SchedulerOptions {
        ordering: OrderingPolicy::new(InfraPolicy::Ignore, InfraBand::default()),
        ..SchedulerOptions::default()
    }
}

/// Builder for an ingestion batch: features plus separately declared edges.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    features: Vec<NewFeature>,
    edges: Vec<DependencyEdge>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature named `f<id>` with priority 0.
    pub fn feature(self, id: FeatureId) -> Self {
        self.feature_with_priority(id, 0)
    }

    pub fn feature_with_priority(mut self, id: FeatureId, priority: i64) -> Self {
        self.features
            .push(NewFeature::new(id, format!("f{id}")).with_priority(priority));
        self
    }

    pub fn done(mut self, id: FeatureId) -> Self {
        self.features
            .push(NewFeature::new(id, format!("f{id}")).with_status(FeatureStatus::Done));
        self
    }

    /// `from` depends on `to`.
    pub fn edge(mut self, from: FeatureId, to: FeatureId) -> Self {
        self.edges.push(DependencyEdge::new(from, to));
        self
    }

    /// Linear chain: each id depends on the previous one.
    pub fn chain(mut self, ids: &[FeatureId]) -> Self {
        for id in ids {
            self = self.feature(*id);
        }
        for pair in ids.windows(2) {
            self = self.edge(pair[1], pair[0]);
        }
        self
    }

    pub fn build(self) -> (Vec<NewFeature>, Vec<DependencyEdge>) {
        (self.features, self.edges)
    }
}

/// A stored-looking feature record, for seeding stores and trackers
/// directly.
pub fn record(id: FeatureId, status: FeatureStatus, deps: &[FeatureId]) -> Feature {
    let mut f = NewFeature::new(id, format!("f{id}")).into_feature();
    f.status = status;
    f.dependencies = deps.to_vec();
    f.sequence = id as u64 + 1;
    if status == FeatureStatus::InProgress {
        f.claimant = Some("seed".to_string());
    }
    f
}
