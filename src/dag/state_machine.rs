// src/dag/state_machine.rs

//! Legal status transitions for a feature.
//!
//! ```text
//! pending --claim--> in_progress --mark_done--> done
//!    ^                    |
//!    +-------skip---------+
//! pending --skip--> pending (re-sequenced)
//! ```
//!
//! `done` is terminal. Every legal transition is turned into a guarded
//! update for the store: the write only lands if the feature still has the
//! status and claimant it was planned against.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::{FeatureDagError, Result};
use crate::store::{Expected, StatusUpdate};
use crate::types::{Feature, FeatureStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Claim,
    MarkDone,
    Skip,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Claim => "claim",
            Transition::MarkDone => "mark_done",
            Transition::Skip => "skip",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guarded write that performs a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransition {
    pub transition: Transition,
    pub expected: Expected,
    pub update: StatusUpdate,
}

/// Decide whether `transition` is legal for `feature` when requested by
/// `worker`, and build the guarded update if so.
pub fn plan(
    transition: Transition,
    feature: &Feature,
    worker: &str,
    now: DateTime<Utc>,
) -> Result<PlannedTransition> {
    let (expected, update) = match (transition, feature.status) {
        (Transition::Claim, FeatureStatus::Pending) => (
            Expected::pending(),
            StatusUpdate {
                status: FeatureStatus::InProgress,
                claimant: Some(worker.to_string()),
                claimed_at: Some(now),
                requeue: false,
            },
        ),
        (Transition::MarkDone, FeatureStatus::InProgress) if feature.is_claimed_by(worker) => (
            Expected::claimed_by(worker),
            StatusUpdate {
                status: FeatureStatus::Done,
                claimant: feature.claimant.clone(),
                claimed_at: feature.claimed_at,
                requeue: false,
            },
        ),
        (Transition::Skip, FeatureStatus::InProgress) if feature.is_claimed_by(worker) => {
            (Expected::claimed_by(worker), StatusUpdate::requeue())
        }
        (Transition::Skip, FeatureStatus::Pending) => (Expected::pending(), StatusUpdate::requeue()),
        _ => return Err(illegal(transition, feature)),
    };

    Ok(PlannedTransition {
        transition,
        expected,
        update,
    })
}

/// Error describing why `transition` cannot be applied to `feature`.
pub fn illegal(transition: Transition, feature: &Feature) -> FeatureDagError {
    FeatureDagError::IllegalTransition {
        feature: feature.id,
        transition,
        actual: feature.status,
        claimant: feature.claimant.clone(),
    }
}
