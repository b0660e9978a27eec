// src/feature_list.rs

//! `feature_list.json` import and export.
//!
//! The file is a JSON array of feature objects. Older files omit most
//! fields, so everything except the array shape is optional on input:
//!
//! ```json
//! [
//!   { "category": "auth", "description": "login form", "steps": ["open /login"], "passes": false },
//!   { "id": 7, "priority": 2, "name": "logout", "dependencies": [1] }
//! ]
//! ```
//!
//! Exported files always carry every field and are ordered by priority,
//! then id.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::Result;
use crate::types::{Feature, FeatureId, FeatureStatus, NewFeature};

/// One element of the file as read from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeatureEntry {
    pub id: Option<FeatureId>,
    pub priority: Option<i64>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<String>>,
    #[serde(default)]
    pub passes: bool,
    #[serde(default)]
    pub in_progress: bool,
    pub dependencies: Option<Vec<FeatureId>>,
}

impl RawFeatureEntry {
    /// Fill in defaults based on the entry's position in the array.
    ///
    /// A missing id is the zero-based index, so the default infra band
    /// `[0, 4]` covers the first five entries of a list without ids.
    ///
    /// `in_progress` cannot be carried over without a claimant, so such
    /// features come back as pending.
    fn into_new_feature(self, index: usize) -> NewFeature {
        let position = index as FeatureId;
        let ordinal = position + 1;
        let status = if self.passes {
            FeatureStatus::Done
        } else {
            FeatureStatus::Pending
        };

        let mut feature = NewFeature::new(
            self.id.unwrap_or(position),
            self.name.unwrap_or_else(|| format!("Feature {ordinal}")),
        )
        .with_priority(self.priority.unwrap_or(ordinal))
        .with_category(self.category.unwrap_or_else(|| "uncategorized".to_string()))
        .with_description(self.description.unwrap_or_default())
        .with_steps(self.steps.unwrap_or_default())
        .with_status(status);

        for dep in self.dependencies.unwrap_or_default() {
            feature = feature.depends_on(dep);
        }
        feature
    }
}

/// One element of an exported file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureEntry {
    pub id: FeatureId,
    pub priority: i64,
    pub category: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<String>,
    pub passes: bool,
    pub in_progress: bool,
    pub dependencies: Vec<FeatureId>,
}

impl From<&Feature> for FeatureEntry {
    fn from(f: &Feature) -> Self {
        Self {
            id: f.id,
            priority: f.priority,
            category: f.category.clone(),
            name: f.name.clone(),
            description: f.description.clone(),
            steps: f.steps.clone(),
            passes: f.status == FeatureStatus::Done,
            in_progress: f.status == FeatureStatus::InProgress,
            dependencies: f.dependencies.clone(),
        }
    }
}

pub fn parse_feature_list(json: &str) -> Result<Vec<NewFeature>> {
    let raw: Vec<RawFeatureEntry> = serde_json::from_str(json)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .map(|(i, entry)| entry.into_new_feature(i))
        .collect())
}

pub fn load_feature_list(path: &Path) -> Result<Vec<NewFeature>> {
    let contents = fs::read_to_string(path)?;
    let features = parse_feature_list(&contents)?;
    debug!(path = %path.display(), count = features.len(), "feature list parsed");
    Ok(features)
}

/// Entries in export order.
pub fn to_entries(features: &[Feature]) -> Vec<FeatureEntry> {
    let mut entries: Vec<FeatureEntry> = features.iter().map(FeatureEntry::from).collect();
    entries.sort_by_key(|e| (e.priority, e.id));
    entries
}

pub fn render_feature_list(features: &[Feature]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_entries(features))?)
}

pub fn export_feature_list(features: &[Feature], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, render_feature_list(features)?)?;
    info!(path = %path.display(), count = features.len(), "feature list exported");
    Ok(())
}
