// tests/scheduler_scenarios.rs

mod common;

use common::*;
use featuredag::engine::{ClaimOutcome, FeatureScheduler, WorkState};
use featuredag::errors::FeatureDagError;
use featuredag::store::FeatureStore;
use featuredag::types::{DependencyEdge, FeatureStatus, InfraPolicy, NewFeature};

async fn fan_out_releases_in_declaration_order<S: FeatureStore>(s: FeatureScheduler<S>) {
    let (x, y, z) = (10, 11, 12);
    s.ingest_graph(
        vec![
            NewFeature::new(x, "X"),
            NewFeature::new(y, "Y").depends_on(x),
            NewFeature::new(z, "Z").depends_on(x),
        ],
        vec![],
    )
    .await
    .unwrap();

    assert_eq!(claimed(s.claim_next("w1").await.unwrap()), x);
    let report = s.mark_done(x, "w1").await.unwrap();
    assert_eq!(report.unblocked, vec![y, z]);

    assert_eq!(claimed(s.claim_next("w1").await.unwrap()), y);
    assert_eq!(claimed(s.claim_next("w1").await.unwrap()), z);
    assert_eq!(
        s.claim_next("w1").await.unwrap(),
        ClaimOutcome::NoEligibleFeature
    );
}

#[tokio::test]
async fn fan_out_memory() {
    fan_out_releases_in_declaration_order(memory_scheduler(plain_options())).await;
}

#[tokio::test]
async fn fan_out_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let s = sqlite_scheduler(&dir.path().join("features.db"), plain_options()).await;
    fan_out_releases_in_declaration_order(s).await;
}

#[tokio::test]
async fn two_feature_cycle_is_rejected() {
    let s = memory_scheduler(plain_options());
    let (p, q) = (20, 21);
    let err = s
        .ingest_graph(
            vec![
                NewFeature::new(p, "P").depends_on(q),
                NewFeature::new(q, "Q").depends_on(p),
            ],
            vec![],
        )
        .await
        .unwrap_err();

    match err {
        FeatureDagError::CycleDetected { members } => assert_eq!(members, vec![p, q]),
        other => panic!("expected CycleDetected, got {other:?}"),
    }
    assert!(s.get_ready_set().await.unwrap().is_empty());
}

#[tokio::test]
async fn dangling_dependency_names_the_missing_id() {
    let s = memory_scheduler(plain_options());
    let err = s
        .ingest_graph(vec![NewFeature::new(30, "A").depends_on(99)], vec![])
        .await
        .unwrap_err();

    match err {
        FeatureDagError::DanglingDependency { entries } => {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].feature, 30);
            assert_eq!(entries[0].missing, 99);
        }
        other => panic!("expected DanglingDependency, got {other:?}"),
    }
}

#[tokio::test]
async fn every_bad_reference_is_reported_with_its_referrer() {
    let s = memory_scheduler(plain_options());
    let err = s
        .ingest_graph(
            vec![NewFeature::new(1, "A").depends_on(98)],
            vec![DependencyEdge::new(99, 1), DependencyEdge::new(97, 1)],
        )
        .await
        .unwrap_err();

    match err {
        FeatureDagError::DanglingDependency { entries } => {
            let pairs: Vec<_> = entries.iter().map(|e| (e.feature, e.missing)).collect();
            assert_eq!(pairs, vec![(1, 98), (97, 97), (99, 99)]);
        }
        other => panic!("expected DanglingDependency, got {other:?}"),
    }
    assert!(s.store().is_empty());
}

async fn skipped_feature_yields_to_tied_peer<S: FeatureStore>(s: FeatureScheduler<S>) {
    let (d, e) = (40, 41);
    s.ingest_graph(
        vec![
            NewFeature::new(d, "D").with_priority(3),
            NewFeature::new(e, "E").with_priority(3),
        ],
        vec![],
    )
    .await
    .unwrap();

    assert_eq!(claimed(s.claim_next("worker1").await.unwrap()), d);
    let skipped = s.skip(d, "worker1").await.unwrap();
    assert_eq!(skipped.status, FeatureStatus::Pending);

    assert_eq!(claimed(s.claim_next("worker2").await.unwrap()), e);
}

#[tokio::test]
async fn skip_memory() {
    skipped_feature_yields_to_tied_peer(memory_scheduler(plain_options())).await;
}

#[tokio::test]
async fn skip_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let s = sqlite_scheduler(&dir.path().join("features.db"), plain_options()).await;
    skipped_feature_yields_to_tied_peer(s).await;
}

#[tokio::test]
async fn infra_band_is_claimed_first_lowest_id_first() {
    let options = ConfigFileBuilder::new()
        .infra_policy(InfraPolicy::Prefer)
        .options();
    let s = memory_scheduler(options);

    let mut batch = vec![NewFeature::new(5, "dashboard").with_priority(0)];
    batch.extend((0..=4).map(|id| NewFeature::new(id, format!("infra {id}")).with_priority(50)));
    s.ingest_graph(batch, vec![]).await.unwrap();

    let order: Vec<_> = s.get_ready_set().await.unwrap().iter().map(|f| f.id).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4, 5]);

    for expected in 0..=4 {
        assert_eq!(claimed(s.claim_next("w").await.unwrap()), expected);
    }
    assert_eq!(claimed(s.claim_next("w").await.unwrap()), 5);
}

#[tokio::test]
async fn infra_band_declared_in_reverse_still_starts_at_lowest_id() {
    let s = memory_scheduler(ConfigFileBuilder::new().options());

    let mut batch: Vec<_> = (0..=4)
        .rev()
        .map(|id| NewFeature::new(id, format!("infra {id}")).with_priority(10))
        .collect();
    batch.push(NewFeature::new(9, "ordinary").with_priority(1));
    s.ingest_graph(batch, vec![]).await.unwrap();

    for expected in 0..=4 {
        assert_eq!(claimed(s.claim_next("w").await.unwrap()), expected);
    }
    assert_eq!(claimed(s.claim_next("w").await.unwrap()), 9);
}

#[tokio::test]
async fn gate_policy_holds_back_ordinary_features() {
    let options = ConfigFileBuilder::new()
        .infra_policy(InfraPolicy::Gate)
        .infra_band(0, 1)
        .options();
    let s = memory_scheduler(options);
    s.ingest_graph(
        vec![NewFeature::new(0, "db"), NewFeature::new(1, "auth"), NewFeature::new(2, "ui")],
        vec![],
    )
    .await
    .unwrap();

    assert_eq!(claimed(s.claim_next("a").await.unwrap()), 0);
    assert_eq!(claimed(s.claim_next("b").await.unwrap()), 1);
    assert_eq!(s.claim_next("c").await.unwrap(), ClaimOutcome::NoEligibleFeature);
    assert_eq!(s.progress().await.unwrap().state, WorkState::Waiting);

    s.mark_done(0, "a").await.unwrap();
    let report = s.mark_done(1, "b").await.unwrap();
    assert_eq!(report.unblocked, vec![2]);
}

#[tokio::test]
async fn incremental_append_may_depend_on_existing_features() {
    let s = memory_scheduler(plain_options());
    s.ingest_graph(vec![NewFeature::new(50, "api")], vec![]).await.unwrap();

    let report = s
        .ingest_graph(
            vec![NewFeature::new(51, "client")],
            vec![DependencyEdge::new(51, 50)],
        )
        .await
        .unwrap();
    assert_eq!(report.inserted, vec![51]);
    assert_eq!(report.total, 2);
    assert_eq!(report.ready, vec![50]);

    let err = s
        .ingest_graph(
            vec![NewFeature::new(52, "docs")],
            vec![DependencyEdge::new(50, 52)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, FeatureDagError::FrozenDependency { from: 50, to: 52 }));

    let err = s
        .ingest_graph(vec![NewFeature::new(50, "api again")], vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, FeatureDagError::DuplicateFeature { ref ids } if ids == &vec![50]));
    assert_eq!(s.progress().await.unwrap().total, 2);
}

#[tokio::test]
async fn progress_tracks_the_whole_lifecycle() {
    let s = memory_scheduler(plain_options());
    let (features, edges) = GraphBuilder::new().chain(&[60, 61]).build();
    s.ingest_graph(features, edges).await.unwrap();

    let p = s.progress().await.unwrap();
    assert_eq!((p.pending, p.ready, p.state), (2, 1, WorkState::Active));
    assert_eq!(p.blocked, vec![61]);

    s.claim_next("w").await.unwrap();
    assert_eq!(s.progress().await.unwrap().state, WorkState::Waiting);
    s.ensure_not_blocked().await.unwrap();

    s.mark_done(60, "w").await.unwrap();
    s.claim_next("w").await.unwrap();
    s.mark_done(61, "w").await.unwrap();

    let p = s.progress().await.unwrap();
    assert_eq!(p.state, WorkState::Complete);
    assert_eq!(p.done, 2);
    assert_eq!(p.percent_done(), 100.0);
}

#[tokio::test]
async fn skip_never_loses_eligibility() {
    let s = memory_scheduler(plain_options());
    let (features, edges) = GraphBuilder::new().chain(&[70, 71]).build();
    s.ingest_graph(features, edges).await.unwrap();

    for _ in 0..3 {
        let f = s.skip(70, "anyone").await.unwrap();
        assert_eq!(f.status, FeatureStatus::Pending);
    }
    let f = s.feature(70).await.unwrap();
    assert_eq!(f.skip_count, 3);
    assert_eq!(s.feature(71).await.unwrap().dependencies, vec![70]);
    assert_eq!(claimed(s.claim_next("w").await.unwrap()), 70);
}
