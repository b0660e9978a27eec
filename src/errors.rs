// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

use crate::dag::state_machine::Transition;
use crate::dag::validate::DanglingRef;
use crate::types::{FeatureId, FeatureStatus, WorkerId};

#[derive(Error, Debug)]
pub enum FeatureDagError {
    #[error("Cycle detected in feature graph; features left unresolved: {members:?}")]
    CycleDetected { members: Vec<FeatureId> },

    #[error("Dangling dependencies: {}", format_dangling(.entries))]
    DanglingDependency { entries: Vec<DanglingRef> },

    #[error("Duplicate feature ids: {ids:?}")]
    DuplicateFeature { ids: Vec<FeatureId> },

    #[error("feature {from} already exists; its dependencies cannot gain an edge to {to}")]
    FrozenDependency { from: FeatureId, to: FeatureId },

    #[error("worker '{worker}' lost the claim race {attempts} times in a row")]
    ConcurrentClaimConflict { worker: WorkerId, attempts: u32 },

    #[error(
        "Illegal transition '{transition}' on feature {feature}: status is {actual}{}",
        format_claimant(.claimant)
    )]
    IllegalTransition {
        feature: FeatureId,
        transition: Transition,
        actual: FeatureStatus,
        claimant: Option<WorkerId>,
    },

    #[error("All remaining features are blocked by unmet dependencies: {blocked:?}")]
    AllFeaturesBlocked { blocked: Vec<FeatureId> },

    #[error("Feature not found: {0}")]
    FeatureNotFound(FeatureId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FeatureDagError {
    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FeatureDagError::ConcurrentClaimConflict { .. })
    }
}

fn format_dangling(entries: &[DanglingRef]) -> String {
    entries
        .iter()
        .map(|e| format!("feature {} -> missing {}", e.feature, e.missing))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_claimant(claimant: &Option<WorkerId>) -> String {
    match claimant {
        Some(w) => format!(" (claimed by '{w}')"),
        None => String::new(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FeatureDagError>;
