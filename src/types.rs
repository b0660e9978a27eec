// src/types.rs

//! Shared data model: features, statuses, dependency edges and the
//! infrastructure band policy.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identity of a feature.
pub type FeatureId = i64;

/// Identity of a worker agent competing for features.
pub type WorkerId = String;

/// Persisted status of a feature.
///
/// A skipped feature always rests in `Pending`; the textual status
/// `"skipped"` is therefore accepted as a synonym when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Pending,
    InProgress,
    Done,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Pending => "pending",
            FeatureStatus::InProgress => "in_progress",
            FeatureStatus::Done => "done",
        }
    }
}

impl Default for FeatureStatus {
    fn default() -> Self {
        FeatureStatus::Pending
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "skipped" => Ok(FeatureStatus::Pending),
            "in_progress" => Ok(FeatureStatus::InProgress),
            "done" => Ok(FeatureStatus::Done),
            other => Err(format!(
                "invalid feature status: {other} (expected \"pending\", \"in_progress\" or \"done\")"
            )),
        }
    }
}

/// How the reserved infrastructure band influences eligibility.
///
/// - `Prefer`: infra features sort ahead of every other ready feature
///   (default).
/// - `Gate`: like `Prefer`, and ordinary features only become ready once
///   every infra feature is done.
/// - `Ignore`: the band has no effect; plain priority/sequence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfraPolicy {
    Prefer,
    Gate,
    Ignore,
}

impl Default for InfraPolicy {
    fn default() -> Self {
        InfraPolicy::Prefer
    }
}

impl FromStr for InfraPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prefer" => Ok(InfraPolicy::Prefer),
            "gate" => Ok(InfraPolicy::Gate),
            "ignore" => Ok(InfraPolicy::Ignore),
            other => Err(format!(
                "invalid infra_policy: {other} (expected \"prefer\", \"gate\" or \"ignore\")"
            )),
        }
    }
}

/// Inclusive range of feature ids reserved for infrastructure features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraBand {
    pub first: FeatureId,
    pub last: FeatureId,
}

impl InfraBand {
    pub fn new(first: FeatureId, last: FeatureId) -> Self {
        Self { first, last }
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        (self.first..=self.last).contains(&id)
    }
}

impl Default for InfraBand {
    fn default() -> Self {
        Self { first: 0, last: 4 }
    }
}

/// Which persistence backend the CLI should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite database file (survives restarts).
    Sqlite,
    /// Process-local memory (lost on exit).
    Memory,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Sqlite
    }
}

/// Directed dependency: `from` depends on `to`, so `to` must be done before
/// `from` can be claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: FeatureId,
    pub to: FeatureId,
}

impl DependencyEdge {
    pub fn new(from: FeatureId, to: FeatureId) -> Self {
        Self { from, to }
    }
}

/// A feature as persisted by a [`crate::store::FeatureStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub steps: Vec<String>,
    /// Lower value means higher priority.
    pub priority: i64,
    pub status: FeatureStatus,
    /// Direct dependencies, in declaration order.
    pub dependencies: Vec<FeatureId>,
    pub claimant: Option<WorkerId>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// FIFO tie-breaker among equal priorities; unique per store.
    pub sequence: u64,
    /// How many times the feature was skipped back into the queue.
    pub skip_count: u32,
}

impl Feature {
    pub fn is_claimed_by(&self, worker: &str) -> bool {
        self.status == FeatureStatus::InProgress && self.claimant.as_deref() == Some(worker)
    }
}

/// Ingestion input for a single feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFeature {
    pub id: FeatureId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub steps: Vec<String>,
    pub priority: i64,
    pub dependencies: Vec<FeatureId>,
    /// `Pending` for fresh work, `Done` when importing finished features.
    pub status: FeatureStatus,
}

impl NewFeature {
    pub fn new(id: FeatureId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            category: "uncategorized".to_string(),
            description: String::new(),
            steps: Vec::new(),
            priority: 0,
            dependencies: Vec::new(),
            status: FeatureStatus::Pending,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    pub fn depends_on(mut self, dep: FeatureId) -> Self {
        if !self.dependencies.contains(&dep) {
            self.dependencies.push(dep);
        }
        self
    }

    pub fn with_status(mut self, status: FeatureStatus) -> Self {
        self.status = status;
        self
    }

    /// Materialise a stored feature. The store overwrites `sequence`.
    pub fn into_feature(self) -> Feature {
        Feature {
            id: self.id,
            name: self.name,
            category: self.category,
            description: self.description,
            steps: self.steps,
            priority: self.priority,
            status: self.status,
            dependencies: self.dependencies,
            claimant: None,
            claimed_at: None,
            sequence: 0,
            skip_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_parses_as_pending() {
        assert_eq!("skipped".parse::<FeatureStatus>(), Ok(FeatureStatus::Pending));
        assert_eq!(" In_Progress ".parse::<FeatureStatus>(), Ok(FeatureStatus::InProgress));
        assert!("blocked".parse::<FeatureStatus>().is_err());
    }

    #[test]
    fn default_band_covers_first_five_ids() {
        let band = InfraBand::default();
        assert!((0..=4).all(|id| band.contains(id)));
        assert!(!band.contains(5));
        assert!(!band.contains(-1));
    }

    #[test]
    fn depends_on_ignores_repeats() {
        let f = NewFeature::new(3, "api").depends_on(1).depends_on(1).depends_on(2);
        assert_eq!(f.dependencies, vec![1, 2]);
    }
}
