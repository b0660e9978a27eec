// tests/cli_run.rs

mod common;

use std::io::Write;
use std::path::Path;

use clap::Parser;
use common::*;
use featuredag::cli::CliArgs;
use featuredag::config::{load_and_validate, load_or_default};
use featuredag::errors::FeatureDagError;
use featuredag::feature_list::load_feature_list;
use featuredag::store::{FeatureStore, SqliteStore, SqliteStoreConfig};
use featuredag::types::{FeatureStatus, InfraPolicy};
use tempfile::NamedTempFile;

const FEATURE_LIST: &str = r#"[
  { "id": 10, "priority": 1, "category": "core", "name": "schema", "passes": true },
  { "id": 11, "priority": 2, "name": "login", "dependencies": [10] },
  { "id": 12, "priority": 3, "name": "profile", "dependencies": [11], "in_progress": true }
]"#;

fn write_list(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

/// Run one CLI invocation with a config path that does not exist, so the
/// built-in defaults apply regardless of the working directory.
async fn run_cli(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
    let config = dir.join("absent.toml");
    let mut argv = vec!["featuredag", "--config", config.to_str().unwrap()];
    argv.extend_from_slice(args);
    featuredag::run(CliArgs::try_parse_from(argv).unwrap()).await
}

#[tokio::test]
async fn ingest_claim_and_done_through_the_cli() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let list = write_list(root, "feature_list.json", FEATURE_LIST);
    let db = root.join("state").join("features.db");
    let db_arg = db.to_str().unwrap();

    run_cli(root, &["ingest", &list, "--db", db_arg]).await.unwrap();
    run_cli(root, &["claim", "--worker", "agent-1", "--db", db_arg]).await.unwrap();
    run_cli(root, &["done", "11", "--worker", "agent-1", "--db", db_arg]).await.unwrap();
    run_cli(root, &["status", "--db", db_arg]).await.unwrap();

    let store = SqliteStore::open(SqliteStoreConfig::with_path(&db)).await.unwrap();
    let features = store.load_all().await.unwrap();
    let status: Vec<_> = features.iter().map(|f| (f.id, f.status)).collect();
    assert_eq!(
        status,
        vec![
            (10, FeatureStatus::Done),
            (11, FeatureStatus::Done),
            (12, FeatureStatus::Pending),
        ]
    );
    assert_eq!(features[1].claimant.as_deref(), Some("agent-1"));
    store.close().await;

    let out = root.join("export.json");
    run_cli(root, &["export", "--output", out.to_str().unwrap(), "--db", db_arg])
        .await
        .unwrap();

    let exported = load_feature_list(&out).unwrap();
    assert_eq!(exported.len(), 3);
    assert_eq!(exported[1].status, FeatureStatus::Done);
    assert_eq!(exported[2].dependencies, vec![11]);
}

#[tokio::test]
async fn wrong_worker_is_an_error_exit() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let list = write_list(root, "feature_list.json", FEATURE_LIST);
    let db = root.join("features.db");
    let db = db.to_str().unwrap();

    run_cli(root, &["ingest", &list, "--db", db]).await.unwrap();
    run_cli(root, &["claim", "--worker", "a", "--db", db]).await.unwrap();

    let err = run_cli(root, &["done", "11", "--worker", "b", "--db", db])
        .await
        .unwrap_err();
    let err = err.downcast::<FeatureDagError>().unwrap();
    assert!(matches!(err, FeatureDagError::IllegalTransition { feature: 11, .. }));
}

#[tokio::test]
async fn validate_rejects_a_cyclic_list_without_a_store() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let cyclic = write_list(
        root,
        "cyclic.json",
        r#"[{ "id": 1, "dependencies": [2] }, { "id": 2, "dependencies": [1] }]"#,
    );

    let err = run_cli(root, &["validate", &cyclic, "--db", ":memory:"])
        .await
        .unwrap_err();
    let err = err.downcast::<FeatureDagError>().unwrap();
    assert!(matches!(err, FeatureDagError::CycleDetected { ref members } if members == &vec![1, 2]));

    let ok = write_list(root, "ok.json", r#"[{ "id": 1 }, { "id": 2, "dependencies": [1] }]"#);
    run_cli(root, &["validate", &ok]).await.unwrap();
}

#[tokio::test]
async fn legacy_list_puts_its_first_five_entries_in_the_infra_band() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let entries: Vec<String> = (0..7)
        .map(|i| format!(r#"{{ "description": "entry {i}", "priority": {} }}"#, 10 - i))
        .collect();
    let list = write_list(root, "legacy.json", &format!("[{}]", entries.join(",")));
    let db = root.join("features.db");
    let db_arg = db.to_str().unwrap();

    run_cli(root, &["ingest", &list, "--db", db_arg]).await.unwrap();

    let store = SqliteStore::open(SqliteStoreConfig::with_path(&db)).await.unwrap();
    let ids: Vec<_> = store.load_all().await.unwrap().iter().map(|f| f.id).collect();
    assert_eq!(ids, (0..7).collect::<Vec<_>>());
    store.close().await;

    let s = sqlite_scheduler(&db, ConfigFileBuilder::new().options()).await;
    let order: Vec<_> = s.get_ready_set().await.unwrap().iter().map(|f| f.id).collect();
    // Entries 5 and 6 carry better priorities but sit outside the band.
    assert_eq!(order, vec![0, 1, 2, 3, 4, 6, 5]);
    s.store().close().await;
}

#[test]
fn config_file_is_parsed_and_validated() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[scheduler]
max_claim_attempts = 9
infra_policy = "gate"
infra_band = [1, 3]

[store]
backend = "memory"
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    let options = cfg.to_scheduler_options();
    assert_eq!(options.max_claim_attempts, 9);
    assert_eq!(options.ordering.infra, InfraPolicy::Gate);
    assert_eq!(options.ordering.band.first, 1);
    assert_eq!(options.ordering.band.last, 3);
}

#[test]
fn unknown_keys_are_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[scheduler]\nmax_attempts = 3\n").unwrap();

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, FeatureDagError::TomlError(_)));
}

#[test]
fn missing_config_file_means_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_or_default(dir.path().join("nope.toml")).unwrap();
    assert_eq!(cfg.to_scheduler_options(), ConfigFileBuilder::new().options());
}
