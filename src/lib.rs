// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod feature_list;
pub mod logging;
pub mod store;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::loader::{default_config_path, load_or_default};
use crate::config::model::ConfigFile;
use crate::dag::validate::validate_graph;
use crate::engine::FeatureScheduler;
use crate::store::{FeatureStore, MemoryStore, SqliteStore, SqliteStoreConfig};
use crate::types::StoreBackend;

/// High-level entry point used by `main.rs`.
///
/// Loads config, opens the store and runs one command, printing its result
/// as JSON on stdout.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_or_default(&config_path)?;
    let options = cfg.to_scheduler_options();
    debug!(config = %config_path.display(), ?options, "configuration loaded");

    if let Command::Validate { file } = &args.command {
        return validate_file(file);
    }

    match resolve_backend(&cfg, args.db.as_ref()) {
        Backend::Memory => {
            info!("using in-memory feature store; state is discarded on exit");
            let scheduler = FeatureScheduler::new(Arc::new(MemoryStore::new()), options);
            dispatch(&scheduler, args.command).await
        }
        Backend::Sqlite(sqlite_cfg) => {
            let store = Arc::new(SqliteStore::open(sqlite_cfg).await?);
            let scheduler = FeatureScheduler::new(Arc::clone(&store), options);
            let result = dispatch(&scheduler, args.command).await;
            store.close().await;
            result
        }
    }
}

enum Backend {
    Memory,
    Sqlite(SqliteStoreConfig),
}

/// `--db` wins over `[store]`; `--db :memory:` selects the memory backend.
fn resolve_backend(cfg: &ConfigFile, db: Option<&PathBuf>) -> Backend {
    match db {
        Some(path) if path.as_os_str() == ":memory:" => Backend::Memory,
        Some(path) => Backend::Sqlite(
            SqliteStoreConfig::with_path(path).max_connections(cfg.store.max_connections),
        ),
        None => match cfg.store.backend {
            StoreBackend::Memory => Backend::Memory,
            StoreBackend::Sqlite => Backend::Sqlite(cfg.to_sqlite_config()),
        },
    }
}

async fn dispatch<S: FeatureStore>(scheduler: &FeatureScheduler<S>, command: Command) -> Result<()> {
    match command {
        Command::Ingest { file } => {
            let features = feature_list::load_feature_list(&file)?;
            let report = scheduler.ingest_graph(features, Vec::new()).await?;
            print_json(&report)
        }
        Command::Ready => print_json(&scheduler.get_ready_set().await?),
        Command::Claim { worker } => print_json(&scheduler.claim_next(&worker).await?),
        Command::Done { id, worker } => print_json(&scheduler.mark_done(id, &worker).await?),
        Command::Skip { id, worker } => print_json(&scheduler.skip(id, &worker).await?),
        Command::Graph => print_json(&scheduler.graph_view().await?),
        Command::Status => {
            let progress = scheduler.progress().await?;
            print_json(&json!({
                "progress": progress,
                "percent_done": progress.percent_done(),
            }))
        }
        Command::Export { output } => {
            let features = scheduler.store().load_all().await?;
            match output {
                Some(path) => {
                    feature_list::export_feature_list(&features, &path)?;
                    print_json(&json!({ "path": path, "count": features.len() }))
                }
                None => {
                    println!("{}", feature_list::render_feature_list(&features)?);
                    Ok(())
                }
            }
        }
        Command::Validate { file } => validate_file(&file),
    }
}

/// Run the graph checks on a feature list against an empty store.
fn validate_file(file: &Path) -> Result<()> {
    let features = feature_list::load_feature_list(file)?;
    let count = features.len();
    let batch = validate_graph(&[], features, &[]).map_err(errors::FeatureDagError::from)?;

    print_json(&json!({
        "valid": true,
        "features": count,
        "order": batch.graph.topological_order().unwrap_or_default(),
    }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
