// src/engine/claim.rs

//! Claim coordination: hand the best ready feature to exactly one worker.
//!
//! There is no global lock. Each attempt:
//! 1. loads a snapshot from the store and derives the ordered ready set,
//! 2. tries a conditional `pending -> in_progress` write on each candidate in
//!    order until one lands.
//!
//! A failed write means another worker got that feature first, so the next
//! candidate is tried. If every candidate of a snapshot is lost, a fresh
//! snapshot is taken. After `max_claim_attempts` snapshots the call gives up
//! with [`FeatureDagError::ConcurrentClaimConflict`].

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::dag::readiness::ReadinessTracker;
use crate::dag::state_machine::{self, Transition};
use crate::engine::{ClaimOutcome, SchedulerOptions};
use crate::errors::{FeatureDagError, Result};
use crate::store::{CasOutcome, FeatureStore};
use crate::types::Feature;

pub struct ClaimCoordinator<'a, S: FeatureStore + ?Sized> {
    store: &'a S,
    options: SchedulerOptions,
}

impl<'a, S: FeatureStore + ?Sized> ClaimCoordinator<'a, S> {
    pub fn new(store: &'a S, options: SchedulerOptions) -> Self {
        Self { store, options }
    }

    pub async fn claim_next(&self, worker: &str) -> Result<ClaimOutcome> {
        let attempts = self.options.max_claim_attempts.max(1);

        for attempt in 1..=attempts {
            let candidates = self.candidates().await?;

            if candidates.is_empty() {
                debug!(worker = %worker, attempt, "no eligible feature");
                return Ok(ClaimOutcome::NoEligibleFeature);
            }

            for candidate in &candidates {
                let planned =
                    state_machine::plan(Transition::Claim, candidate, worker, Utc::now())?;

                match self
                    .store
                    .compare_and_set(candidate.id, &planned.expected, &planned.update)
                    .await?
                {
                    CasOutcome::Applied(feature) => {
                        info!(
                            feature = feature.id,
                            name = %feature.name,
                            worker = %worker,
                            attempt,
                            "feature claimed"
                        );
                        return Ok(ClaimOutcome::Claimed(feature));
                    }
                    CasOutcome::Conflict(current) => {
                        debug!(
                            feature = candidate.id,
                            worker = %worker,
                            attempt,
                            current_status = ?current.as_ref().map(|f| f.status),
                            "lost claim race; trying next candidate"
                        );
                    }
                }
            }

            debug!(
                worker = %worker,
                attempt,
                candidates = candidates.len(),
                "every candidate in snapshot was taken; refreshing"
            );
        }

        warn!(worker = %worker, attempts, "giving up after repeated claim conflicts");
        Err(FeatureDagError::ConcurrentClaimConflict {
            worker: worker.to_string(),
            attempts,
        })
    }

    /// Ready features from a fresh snapshot, in selection order.
    async fn candidates(&self) -> Result<Vec<Feature>> {
        let snapshot = self.store.load_all().await?;
        let tracker = ReadinessTracker::new(snapshot, self.options.ordering);
        Ok(tracker.ready_set().into_iter().cloned().collect())
    }
}
