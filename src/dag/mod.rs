// src/dag/mod.rs

//! Feature graph and the pure logic derived from it.
//!
//! - [`graph`] holds the dependency graph and Kahn reduction.
//! - [`validate`] rejects batches with duplicates, dangling edges or cycles.
//! - [`readiness`] derives the ordered ready set from a snapshot.
//! - [`state_machine`] decides which status transitions are legal.

pub mod graph;
pub mod readiness;
pub mod state_machine;
pub mod validate;

pub use graph::FeatureGraph;
pub use readiness::{OrderingKey, OrderingPolicy, ReadinessTracker};
pub use state_machine::Transition;
pub use validate::{DanglingRef, GraphRejection, ValidatedBatch, validate_graph};
