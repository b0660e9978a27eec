// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::FeatureId;

/// Command-line arguments for `featuredag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "featuredag",
    version,
    about = "Dependency-aware feature scheduler for competing worker agents.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `$FEATUREDAG_CONFIG`, else `Featuredag.toml` in the current
    /// working directory. A missing file means built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Feature database; overrides `[store]`. `:memory:` uses a throwaway
    /// in-process store.
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FEATUREDAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Validate a feature_list.json and append it to the store.
    Ingest {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the ready set in claim order.
    Ready,

    /// Claim the next ready feature.
    Claim {
        #[arg(long, value_name = "WORKER")]
        worker: String,
    },

    /// Mark a claimed feature as done.
    Done {
        #[arg(value_name = "ID")]
        id: FeatureId,
        #[arg(long, value_name = "WORKER")]
        worker: String,
    },

    /// Return a feature to the back of the queue.
    Skip {
        #[arg(value_name = "ID")]
        id: FeatureId,
        #[arg(long, value_name = "WORKER")]
        worker: String,
    },

    /// Print nodes and edges for a graph visualiser.
    Graph,

    /// Print progress counters.
    Status,

    /// Write the store back out as feature_list.json.
    Export {
        /// Output file; stdout when omitted.
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Check a feature_list.json without touching the store.
    Validate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
