// src/dag/validate.rs

//! Graph validation run before anything is persisted.
//!
//! Checks, in order:
//! - duplicate ids (within the batch, or against already stored features)
//! - new edges leaving features that already exist
//! - dependencies naming unknown features
//! - cycles (Kahn reduction over existing + incoming features)

use std::collections::{BTreeSet, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::dag::graph::FeatureGraph;
use crate::errors::FeatureDagError;
use crate::types::{DependencyEdge, Feature, FeatureId, NewFeature};

/// One bad edge: `feature` depends on `missing`, which does not exist.
///
/// A declared edge whose source is unknown is reported with the source as
/// both `feature` and `missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DanglingRef {
    pub feature: FeatureId,
    pub missing: FeatureId,
}

/// Structured reason a batch was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphRejection {
    Duplicate { ids: Vec<FeatureId> },
    Frozen { from: FeatureId, to: FeatureId },
    Dangling { entries: Vec<DanglingRef> },
    Cycle { members: Vec<FeatureId> },
}

impl From<GraphRejection> for FeatureDagError {
    fn from(rejection: GraphRejection) -> Self {
        match rejection {
            GraphRejection::Duplicate { ids } => FeatureDagError::DuplicateFeature { ids },
            GraphRejection::Frozen { from, to } => FeatureDagError::FrozenDependency { from, to },
            GraphRejection::Dangling { entries } => {
                FeatureDagError::DanglingDependency { entries }
            }
            GraphRejection::Cycle { members } => FeatureDagError::CycleDetected { members },
        }
    }
}

/// An accepted batch: the incoming features with separately declared edges
/// merged into their dependency lists, plus the combined graph.
#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub features: Vec<NewFeature>,
    pub graph: FeatureGraph,
}

/// Validate `incoming` features and `edges` against the `existing` ones.
pub fn validate_graph(
    existing: &[Feature],
    incoming: Vec<NewFeature>,
    edges: &[DependencyEdge],
) -> Result<ValidatedBatch, GraphRejection> {
    check_duplicates(existing, &incoming)?;

    let existing_ids: HashSet<FeatureId> = existing.iter().map(|f| f.id).collect();
    let (features, unknown_sources) = merge_edges(incoming, edges, &existing_ids)?;

    let known: HashSet<FeatureId> = existing_ids
        .iter()
        .copied()
        .chain(features.iter().map(|f| f.id))
        .collect();
    check_dangling(&features, edges, unknown_sources, &known)?;

    let graph = FeatureGraph::from_nodes(
        existing
            .iter()
            .map(|f| (f.id, f.dependencies.clone()))
            .chain(features.iter().map(|f| (f.id, f.dependencies.clone()))),
    );
    check_cycles(&graph)?;

    debug!(
        incoming = features.len(),
        total = graph.len(),
        "feature graph validated"
    );

    Ok(ValidatedBatch { features, graph })
}

fn check_duplicates(existing: &[Feature], incoming: &[NewFeature]) -> Result<(), GraphRejection> {
    let stored: HashSet<FeatureId> = existing.iter().map(|f| f.id).collect();
    let mut seen = HashSet::new();
    let mut dupes = BTreeSet::new();

    for f in incoming {
        if stored.contains(&f.id) || !seen.insert(f.id) {
            dupes.insert(f.id);
        }
    }

    if dupes.is_empty() {
        Ok(())
    } else {
        Err(GraphRejection::Duplicate {
            ids: dupes.into_iter().collect(),
        })
    }
}

/// Fold `edges` into the dependency lists of the incoming features.
///
/// Edges leaving a stored feature are rejected outright. Edges leaving an
/// id nobody declared are returned so they can be reported with the other
/// dangling references.
fn merge_edges(
    mut incoming: Vec<NewFeature>,
    edges: &[DependencyEdge],
    existing_ids: &HashSet<FeatureId>,
) -> Result<(Vec<NewFeature>, Vec<DanglingRef>), GraphRejection> {
    let mut unknown_sources = Vec::new();

    for edge in edges {
        match incoming.iter_mut().find(|f| f.id == edge.from) {
            Some(f) => {
                if !f.dependencies.contains(&edge.to) {
                    f.dependencies.push(edge.to);
                }
            }
            None if existing_ids.contains(&edge.from) => {
                return Err(GraphRejection::Frozen {
                    from: edge.from,
                    to: edge.to,
                });
            }
            None => unknown_sources.push(DanglingRef {
                feature: edge.from,
                missing: edge.from,
            }),
        }
    }
    Ok((incoming, unknown_sources))
}

fn check_dangling(
    features: &[NewFeature],
    edges: &[DependencyEdge],
    mut entries: Vec<DanglingRef>,
    known: &HashSet<FeatureId>,
) -> Result<(), GraphRejection> {
    let undeclared: HashSet<FeatureId> = entries.iter().map(|e| e.feature).collect();

    // Targets of edges whose source was never merged into a feature.
    entries.extend(
        edges
            .iter()
            .filter(|e| undeclared.contains(&e.from) && !known.contains(&e.to))
            .map(|e| DanglingRef {
                feature: e.from,
                missing: e.to,
            }),
    );

    entries.extend(features.iter().flat_map(|f| {
        f.dependencies
            .iter()
            .filter(|dep| !known.contains(dep))
            .map(move |dep| DanglingRef {
                feature: f.id,
                missing: *dep,
            })
    }));

    if entries.is_empty() {
        return Ok(());
    }

    entries.sort();
    entries.dedup();
    Err(GraphRejection::Dangling { entries })
}

fn check_cycles(graph: &FeatureGraph) -> Result<(), GraphRejection> {
    let reduction = graph.reduce();
    if reduction.remaining.is_empty() {
        return Ok(());
    }

    let cycles = cycle_components(graph, &reduction.remaining);
    warn!(
        members = ?reduction.remaining,
        ?cycles,
        "cycle detected in feature graph"
    );

    Err(GraphRejection::Cycle {
        members: reduction.remaining,
    })
}

/// Group the features left over by the reduction into the actual cycles
/// (strongly connected components with more than one member, or a
/// self-loop). Features that only sit downstream of a cycle are omitted.
pub fn cycle_components(graph: &FeatureGraph, remaining: &[FeatureId]) -> Vec<Vec<FeatureId>> {
    let members: HashSet<FeatureId> = remaining.iter().copied().collect();

    // Edge direction: dep -> feature.
    let mut g: DiGraphMap<FeatureId, ()> = DiGraphMap::new();
    for id in remaining {
        g.add_node(*id);
    }
    for id in remaining {
        for dep in graph.dependencies_of(*id) {
            if members.contains(dep) {
                g.add_edge(*dep, *id, ());
            }
        }
    }

    let mut cycles: Vec<Vec<FeatureId>> = tarjan_scc(&g)
        .into_iter()
        .filter(|scc| scc.len() > 1 || g.contains_edge(scc[0], scc[0]))
        .map(|mut scc| {
            scc.sort_unstable();
            scc
        })
        .collect();
    cycles.sort();
    cycles
}
