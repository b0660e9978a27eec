// src/dag/readiness.rs

//! Derived view of which features are eligible to be claimed.
//!
//! The tracker is always rebuilt from a snapshot of stored features. It keeps
//! a per-feature count of dependencies that are not yet done; a pending
//! feature whose count is zero is ready.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::dag::graph::FeatureGraph;
use crate::types::{Feature, FeatureId, FeatureStatus, InfraBand, InfraPolicy};

/// Policy knobs that shape eligibility and ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderingPolicy {
    pub infra: InfraPolicy,
    pub band: InfraBand,
}

impl OrderingPolicy {
    pub fn new(infra: InfraPolicy, band: InfraBand) -> Self {
        Self { infra, band }
    }

    fn is_infra(&self, id: FeatureId) -> bool {
        self.infra != InfraPolicy::Ignore && self.band.contains(id)
    }

    /// Selection key: infra band first (unless ignored) in id order, then
    /// priority, then sequence.
    pub fn key(&self, feature: &Feature) -> OrderingKey {
        let infra = self.is_infra(feature.id);
        OrderingKey {
            band_rank: if infra { 0 } else { 1 },
            band_position: if infra { feature.id } else { 0 },
            priority: feature.priority,
            sequence: feature.sequence,
        }
    }
}

/// Total order used to pick among ready features. Sequences are unique per
/// store, so two distinct features never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderingKey {
    pub band_rank: u8,
    /// Id within the infra band; zero for ordinary features.
    pub band_position: FeatureId,
    pub priority: i64,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct ReadinessTracker {
    features: BTreeMap<FeatureId, Feature>,
    graph: FeatureGraph,
    /// Dependencies not yet done (missing dependencies never resolve).
    unresolved: HashMap<FeatureId, usize>,
    /// Infra features not yet done; only consulted under `InfraPolicy::Gate`.
    infra_outstanding: usize,
    policy: OrderingPolicy,
}

impl ReadinessTracker {
    pub fn new(features: Vec<Feature>, policy: OrderingPolicy) -> Self {
        let graph = FeatureGraph::from_features(&features);
        let features: BTreeMap<FeatureId, Feature> =
            features.into_iter().map(|f| (f.id, f)).collect();

        let unresolved = features
            .values()
            .map(|f| {
                let open = f
                    .dependencies
                    .iter()
                    .filter(|dep| {
                        features
                            .get(dep)
                            .map(|d| d.status != FeatureStatus::Done)
                            .unwrap_or(true)
                    })
                    .count();
                (f.id, open)
            })
            .collect();

        let infra_outstanding = features
            .values()
            .filter(|f| policy.is_infra(f.id) && f.status != FeatureStatus::Done)
            .count();

        Self {
            features,
            graph,
            unresolved,
            infra_outstanding,
            policy,
        }
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.policy
    }

    pub fn graph(&self) -> &FeatureGraph {
        &self.graph
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// Number of dependencies of `id` that are not done yet.
    pub fn unresolved(&self, id: FeatureId) -> Option<usize> {
        self.unresolved.get(&id).copied()
    }

    pub fn is_ready(&self, id: FeatureId) -> bool {
        let Some(feature) = self.features.get(&id) else {
            return false;
        };
        if feature.status != FeatureStatus::Pending {
            return false;
        }
        if self.unresolved.get(&id).copied().unwrap_or(0) > 0 {
            return false;
        }
        if self.policy.infra == InfraPolicy::Gate && !self.policy.is_infra(id) {
            return self.infra_outstanding == 0;
        }
        true
    }

    /// Ready features in selection order.
    pub fn ready_set(&self) -> Vec<&Feature> {
        let mut ready: Vec<&Feature> = self
            .features
            .values()
            .filter(|f| self.is_ready(f.id))
            .collect();
        ready.sort_by_key(|f| self.policy.key(f));
        ready
    }

    pub fn ready_ids(&self) -> Vec<FeatureId> {
        self.ready_set().into_iter().map(|f| f.id).collect()
    }

    /// Pending features that are not ready.
    pub fn blocked(&self) -> Vec<FeatureId> {
        self.features
            .values()
            .filter(|f| f.status == FeatureStatus::Pending && !self.is_ready(f.id))
            .map(|f| f.id)
            .collect()
    }

    pub fn count_by_status(&self, status: FeatureStatus) -> usize {
        self.features.values().filter(|f| f.status == status).count()
    }

    /// Record that `id` reached `done`, decrementing the counters of its
    /// dependents. Returns the features that became ready, in selection
    /// order.
    pub fn mark_done(&mut self, id: FeatureId) -> Vec<FeatureId> {
        let before: HashSet<FeatureId> = self.ready_ids().into_iter().collect();

        match self.features.get_mut(&id) {
            Some(f) if f.status != FeatureStatus::Done => {
                f.status = FeatureStatus::Done;
                f.claimant = None;
            }
            _ => return Vec::new(),
        }

        if self.policy.is_infra(id) {
            self.infra_outstanding = self.infra_outstanding.saturating_sub(1);
        }

        for dependent in self.graph.dependents_of(id) {
            if let Some(n) = self.unresolved.get_mut(dependent) {
                *n = n.saturating_sub(1);
            }
        }

        self.ready_ids()
            .into_iter()
            .filter(|id| !before.contains(id))
            .collect()
    }
}
