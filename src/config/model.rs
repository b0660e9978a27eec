// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::dag::readiness::OrderingPolicy;
use crate::engine::{DEFAULT_MAX_CLAIM_ATTEMPTS, SchedulerOptions};
use crate::store::SqliteStoreConfig;
use crate::types::{FeatureId, InfraBand, InfraPolicy, StoreBackend};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [scheduler]
/// max_claim_attempts = 5
/// infra_policy = "prefer"
/// infra_band = [0, 4]
///
/// [store]
/// backend = "sqlite"
/// path = ".featuredag/features.db"
/// max_connections = 4
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub store: StoreSection,
}

/// Validated configuration. Only built through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub scheduler: SchedulerSection,
    pub store: StoreSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(scheduler: SchedulerSection, store: StoreSection) -> Self {
        Self { scheduler, store }
    }

    pub fn to_scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            max_claim_attempts: self.scheduler.max_claim_attempts,
            ordering: OrderingPolicy::new(self.scheduler.infra_policy, self.scheduler.band()),
        }
    }

    pub fn to_sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig::with_path(&self.store.path).max_connections(self.store.max_connections)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(SchedulerSection::default(), StoreSection::default())
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSection {
    /// Snapshot refreshes a single `claim_next` may perform.
    #[serde(default = "default_max_claim_attempts")]
    pub max_claim_attempts: u32,

    /// `"prefer"`, `"gate"` or `"ignore"`.
    #[serde(default)]
    pub infra_policy: InfraPolicy,

    /// Inclusive `[first, last]` id range of infrastructure features.
    #[serde(default = "default_infra_band")]
    pub infra_band: [FeatureId; 2],
}

impl SchedulerSection {
    pub fn band(&self) -> InfraBand {
        InfraBand::new(self.infra_band[0], self.infra_band[1])
    }
}

fn default_max_claim_attempts() -> u32 {
    DEFAULT_MAX_CLAIM_ATTEMPTS
}

fn default_infra_band() -> [FeatureId; 2] {
    let band = InfraBand::default();
    [band.first, band.last]
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_claim_attempts: default_max_claim_attempts(),
            infra_policy: InfraPolicy::default(),
            infra_band: default_infra_band(),
        }
    }
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Database file for the sqlite backend.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".featuredag/features.db")
}

fn default_max_connections() -> u32 {
    4
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            max_connections: default_max_connections(),
        }
    }
}
