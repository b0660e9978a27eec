// src/dag/graph.rs

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::types::{DependencyEdge, Feature, FeatureId};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct FeatureNode {
    /// Direct dependencies: features that must be done before this one.
    deps: Vec<FeatureId>,
    /// Direct dependents: features that list this one as a dependency.
    dependents: Vec<FeatureId>,
}

/// In-memory dependency graph keyed by feature id.
///
/// The graph holds no scheduling state. It is rebuilt from a snapshot of
/// stored features whenever a decision needs it, and validated by
/// [`crate::dag::validate`] before anything is persisted.
#[derive(Debug, Clone, Default)]
pub struct FeatureGraph {
    nodes: BTreeMap<FeatureId, FeatureNode>,
}

/// Result of running Kahn's reduction over the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    /// Features in the order they were removed (ties broken by id).
    pub order: Vec<FeatureId>,
    /// Features never removed: members of a cycle, or downstream of one.
    pub remaining: Vec<FeatureId>,
}

impl FeatureGraph {
    /// Build a graph from `(id, dependencies)` pairs.
    ///
    /// Dependencies naming unknown ids are kept in the dependency list but
    /// do not produce a dependent entry; the validator reports them.
    pub fn from_nodes<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (FeatureId, Vec<FeatureId>)>,
    {
        let mut map: BTreeMap<FeatureId, FeatureNode> = BTreeMap::new();

        for (id, deps) in nodes {
            let node = map.entry(id).or_default();
            for dep in deps {
                if !node.deps.contains(&dep) {
                    node.deps.push(dep);
                }
            }
        }

        let edges: Vec<(FeatureId, FeatureId)> = map
            .iter()
            .flat_map(|(id, node)| node.deps.iter().map(move |dep| (*id, *dep)))
            .collect();

        for (id, dep) in edges {
            if let Some(dep_node) = map.get_mut(&dep) {
                dep_node.dependents.push(id);
            }
        }

        Self { nodes: map }
    }

    /// Build a graph from stored features.
    pub fn from_features(features: &[Feature]) -> Self {
        Self::from_nodes(features.iter().map(|f| (f.id, f.dependencies.clone())))
    }

    /// All feature ids, ascending.
    pub fn features(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn contains(&self, id: FeatureId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Immediate dependencies of a feature.
    pub fn dependencies_of(&self, id: FeatureId) -> &[FeatureId] {
        self.nodes
            .get(&id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a feature.
    pub fn dependents_of(&self, id: FeatureId) -> &[FeatureId] {
        self.nodes
            .get(&id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Every edge whose target exists in the graph.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.nodes
            .iter()
            .flat_map(|(id, node)| {
                node.deps
                    .iter()
                    .filter(|dep| self.nodes.contains_key(dep))
                    .map(move |dep| DependencyEdge::new(*id, *dep))
            })
            .collect()
    }

    /// Kahn's reduction: repeatedly remove features whose dependencies have
    /// all been removed. Unknown dependencies are ignored here.
    pub fn reduce(&self) -> Reduction {
        let mut indegree: BTreeMap<FeatureId, usize> = self
            .nodes
            .iter()
            .map(|(id, node)| {
                let known = node
                    .deps
                    .iter()
                    .filter(|dep| self.nodes.contains_key(dep))
                    .count();
                (*id, known)
            })
            .collect();

        let mut queue: BinaryHeap<Reverse<FeatureId>> = indegree
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(Reverse(id)) = queue.pop() {
            order.push(id);
            for dependent in self.dependents_of(id) {
                if let Some(n) = indegree.get_mut(dependent) {
                    *n -= 1;
                    if *n == 0 {
                        queue.push(Reverse(*dependent));
                    }
                }
            }
        }

        let remaining = if order.len() == self.nodes.len() {
            Vec::new()
        } else {
            indegree
                .into_iter()
                .filter(|(_, n)| *n > 0)
                .map(|(id, _)| id)
                .collect()
        };

        Reduction { order, remaining }
    }

    /// A topological order (dependencies first), or `None` if the graph has
    /// a cycle.
    pub fn topological_order(&self) -> Option<Vec<FeatureId>> {
        let reduction = self.reduce();
        if reduction.remaining.is_empty() {
            Some(reduction.order)
        } else {
            None
        }
    }
}
