// src/config/mod.rs

//! Configuration loading and validation for featuredag.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading from disk, with defaults when the file is absent (`loader.rs`).
//! - Range checks on the raw values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, RawConfigFile, SchedulerSection, StoreSection};
