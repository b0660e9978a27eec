// src/engine/mod.rs

//! Scheduling engine.
//!
//! This module ties together:
//! - the persisted feature store (single source of truth)
//! - the readiness view derived from it
//! - the claim coordinator that hands features to competing workers
//! - the state machine guarding `mark_done` / `skip`
//!
//! [`FeatureScheduler`] is the typed command surface consumed by agent
//! orchestration, visualisation and the CLI.

use serde::Serialize;

use crate::dag::readiness::OrderingPolicy;
use crate::types::{DependencyEdge, Feature, FeatureId, FeatureStatus, WorkerId};

pub mod claim;
pub mod scheduler;

pub use claim::ClaimCoordinator;
pub use scheduler::FeatureScheduler;

/// Default number of snapshot refreshes `claim_next` performs before giving
/// up with a conflict error.
pub const DEFAULT_MAX_CLAIM_ATTEMPTS: u32 = 5;

/// Tunables shared by the scheduler and the claim coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub max_claim_attempts: u32,
    pub ordering: OrderingPolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_claim_attempts: DEFAULT_MAX_CLAIM_ATTEMPTS,
            ordering: OrderingPolicy::default(),
        }
    }
}

/// Result of `claim_next`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "feature", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// The worker now owns this feature (status `in_progress`).
    Claimed(Feature),
    /// Nothing is ready right now. Not an error: work may still be pending
    /// behind in-progress features, or everything may be done.
    NoEligibleFeature,
}

impl ClaimOutcome {
    pub fn feature(&self) -> Option<&Feature> {
        match self {
            ClaimOutcome::Claimed(f) => Some(f),
            ClaimOutcome::NoEligibleFeature => None,
        }
    }

    pub fn into_feature(self) -> Option<Feature> {
        match self {
            ClaimOutcome::Claimed(f) => Some(f),
            ClaimOutcome::NoEligibleFeature => None,
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Ids stored by this call, in declaration order.
    pub inserted: Vec<FeatureId>,
    /// Features in the store after the call.
    pub total: usize,
    /// Ready set after the call, in selection order.
    pub ready: Vec<FeatureId>,
}

/// Result of a successful `mark_done`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoneReport {
    pub feature: Feature,
    /// Features that became ready because of this completion.
    pub unblocked: Vec<FeatureId>,
}

/// Read-only node for an external graph visualiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: FeatureId,
    pub name: String,
    pub category: String,
    pub priority: i64,
    pub status: FeatureStatus,
    pub claimant: Option<WorkerId>,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<DependencyEdge>,
}

/// Coarse state of the whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkState {
    /// Nothing pending or in progress.
    Complete,
    /// At least one feature can be claimed.
    Active,
    /// Nothing ready, but in-progress work may unblock more.
    Waiting,
    /// Pending features remain, none is ready and nothing is in progress.
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub ready: usize,
    /// Pending features with unmet dependencies.
    pub blocked: Vec<FeatureId>,
    pub state: WorkState,
}

impl ProgressSummary {
    /// Share of features done, in percent. An empty project is 100% done.
    pub fn percent_done(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        }
    }
}
