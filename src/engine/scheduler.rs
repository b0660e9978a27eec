// src/engine/scheduler.rs

//! Typed command surface over a [`FeatureStore`].
//!
//! Nothing here caches scheduling state: every call reloads a snapshot from
//! the store and derives readiness from it, so a restarted process picks up
//! exactly where the last one left off.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::dag::readiness::ReadinessTracker;
use crate::dag::state_machine::{self, Transition};
use crate::dag::validate::validate_graph;
use crate::engine::claim::ClaimCoordinator;
use crate::engine::{
    ClaimOutcome, DoneReport, GraphNode, GraphView, IngestReport, ProgressSummary,
    SchedulerOptions, WorkState,
};
use crate::errors::{FeatureDagError, Result};
use crate::store::{CasOutcome, Expected, FeatureStore, StatusUpdate};
use crate::types::{DependencyEdge, Feature, FeatureId, FeatureStatus, NewFeature};

pub struct FeatureScheduler<S: FeatureStore> {
    store: Arc<S>,
    options: SchedulerOptions,
    /// Serialises validate-then-insert so two appends cannot both pass
    /// validation against the same snapshot.
    ingest_lock: Arc<Mutex<()>>,
}

impl<S: FeatureStore> Clone for FeatureScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            options: self.options,
            ingest_lock: Arc::clone(&self.ingest_lock),
        }
    }
}

impl<S: FeatureStore> FeatureScheduler<S> {
    pub fn new(store: Arc<S>, options: SchedulerOptions) -> Self {
        Self {
            store,
            options,
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> SchedulerOptions {
        self.options
    }

    /// Validate and persist a batch of features plus extra edges.
    ///
    /// The batch is checked against everything already stored; a rejected
    /// batch stores nothing.
    pub async fn ingest_graph(
        &self,
        features: Vec<NewFeature>,
        edges: Vec<DependencyEdge>,
    ) -> Result<IngestReport> {
        let _guard = self.ingest_lock.lock().await;

        let features: Vec<NewFeature> = features
            .into_iter()
            .map(|mut f| {
                if f.status == FeatureStatus::InProgress {
                    warn!(feature = f.id, "ingested feature was in progress; storing as pending");
                    f.status = FeatureStatus::Pending;
                }
                f
            })
            .collect();

        let existing = self.store.load_all().await?;
        let batch = match validate_graph(&existing, features, &edges) {
            Ok(batch) => batch,
            Err(rejection) => {
                warn!(?rejection, "feature batch rejected");
                return Err(rejection.into());
            }
        };

        let stored = self.store.insert_features(batch.features).await?;
        let inserted: Vec<FeatureId> = stored.iter().map(|f| f.id).collect();

        let tracker = self.tracker().await?;
        let report = IngestReport {
            inserted,
            total: tracker.features().count(),
            ready: tracker.ready_ids(),
        };

        info!(
            inserted = report.inserted.len(),
            total = report.total,
            ready = report.ready.len(),
            "feature batch ingested"
        );
        Ok(report)
    }

    /// Ready features in the order `claim_next` would hand them out.
    pub async fn get_ready_set(&self) -> Result<Vec<Feature>> {
        let tracker = self.tracker().await?;
        Ok(tracker.ready_set().into_iter().cloned().collect())
    }

    pub async fn claim_next(&self, worker: &str) -> Result<ClaimOutcome> {
        ClaimCoordinator::new(self.store.as_ref(), self.options)
            .claim_next(worker)
            .await
    }

    /// Complete a feature held by `worker`. The report lists the features
    /// this completion made eligible.
    pub async fn mark_done(&self, id: FeatureId, worker: &str) -> Result<DoneReport> {
        let current = self.feature(id).await?;
        let planned = state_machine::plan(Transition::MarkDone, &current, worker, Utc::now())?;

        let done = self
            .apply(id, Transition::MarkDone, &planned.expected, &planned.update)
            .await?;

        // Replay the completion on a post-write snapshot to see exactly what
        // it released.
        let mut snapshot = self.store.load_all().await?;
        if let Some(f) = snapshot.iter_mut().find(|f| f.id == id) {
            f.status = FeatureStatus::InProgress;
        }
        let mut tracker = ReadinessTracker::new(snapshot, self.options.ordering);
        let unblocked = tracker.mark_done(id);

        info!(
            feature = id,
            worker = %worker,
            unblocked = ?unblocked,
            "feature done"
        );
        Ok(DoneReport {
            feature: done,
            unblocked,
        })
    }

    /// Put a feature back in the queue behind its current peers.
    pub async fn skip(&self, id: FeatureId, worker: &str) -> Result<Feature> {
        let current = self.feature(id).await?;
        let planned = state_machine::plan(Transition::Skip, &current, worker, Utc::now())?;

        let skipped = self
            .apply(id, Transition::Skip, &planned.expected, &planned.update)
            .await?;

        info!(
            feature = id,
            worker = %worker,
            sequence = skipped.sequence,
            skip_count = skipped.skip_count,
            "feature skipped"
        );
        Ok(skipped)
    }

    pub async fn feature(&self, id: FeatureId) -> Result<Feature> {
        self.store
            .get(id)
            .await?
            .ok_or(FeatureDagError::FeatureNotFound(id))
    }

    /// Read-only projection for graph visualisers.
    pub async fn graph_view(&self) -> Result<GraphView> {
        let tracker = self.tracker().await?;

        let nodes = tracker
            .features()
            .map(|f| GraphNode {
                id: f.id,
                name: f.name.clone(),
                category: f.category.clone(),
                priority: f.priority,
                status: f.status,
                claimant: f.claimant.clone(),
                ready: tracker.is_ready(f.id),
            })
            .collect();

        Ok(GraphView {
            nodes,
            edges: tracker.graph().edges(),
        })
    }

    pub async fn progress(&self) -> Result<ProgressSummary> {
        let tracker = self.tracker().await?;

        let pending = tracker.count_by_status(FeatureStatus::Pending);
        let in_progress = tracker.count_by_status(FeatureStatus::InProgress);
        let done = tracker.count_by_status(FeatureStatus::Done);
        let ready = tracker.ready_ids().len();

        let state = if pending == 0 && in_progress == 0 {
            WorkState::Complete
        } else if ready > 0 {
            WorkState::Active
        } else if in_progress > 0 {
            WorkState::Waiting
        } else {
            WorkState::Blocked
        };

        Ok(ProgressSummary {
            total: pending + in_progress + done,
            pending,
            in_progress,
            done,
            ready,
            blocked: tracker.blocked(),
            state,
        })
    }

    /// Fail when pending work remains but nothing can ever become ready
    /// without outside intervention.
    pub async fn ensure_not_blocked(&self) -> Result<()> {
        let progress = self.progress().await?;
        if progress.state == WorkState::Blocked {
            warn!(blocked = ?progress.blocked, "all remaining features are blocked");
            return Err(FeatureDagError::AllFeaturesBlocked {
                blocked: progress.blocked,
            });
        }
        Ok(())
    }

    async fn tracker(&self) -> Result<ReadinessTracker> {
        let snapshot = self.store.load_all().await?;
        Ok(ReadinessTracker::new(snapshot, self.options.ordering))
    }

    async fn apply(
        &self,
        id: FeatureId,
        transition: Transition,
        expected: &Expected,
        update: &StatusUpdate,
    ) -> Result<Feature> {
        match self.store.compare_and_set(id, expected, update).await? {
            CasOutcome::Applied(feature) => Ok(feature),
            CasOutcome::Conflict(Some(current)) => {
                debug!(
                    feature = id,
                    transition = %transition,
                    status = %current.status,
                    "feature changed before the write landed"
                );
                Err(state_machine::illegal(transition, &current))
            }
            CasOutcome::Conflict(None) => Err(FeatureDagError::FeatureNotFound(id)),
        }
    }
}
