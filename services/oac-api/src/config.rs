//! Service configuration loading and types.

use anyhow::{Context, Result};
use oac_protocol::engine::DEFAULT_EXCLUDED_ATTRIBUTE;
use oac_protocol::{EngineOptions, ResourceLimits};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Service configuration loaded from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root directory holding one repository directory per catalog.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Catalogs to load, in listing order.
    #[serde(default = "default_catalogs")]
    pub catalogs: Vec<CatalogSource>,

    /// Catalog ids in the order copies of the same event are preferred.
    /// Empty means the order of `catalogs`.
    #[serde(default)]
    pub preference_order: Vec<String>,

    /// Bounds on catalog-wide queries.
    #[serde(default)]
    pub limits: ResourceLimits,

    /// Attributes whose presence excludes a row from attribute queries.
    #[serde(default = "default_excluded_attributes")]
    pub excluded_attributes: Vec<String>,

    /// Per-request deadline.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            catalogs: default_catalogs(),
            preference_order: Vec::new(),
            limits: ResourceLimits::default(),
            excluded_attributes: default_excluded_attributes(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        let config: ApiConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse: {:?}", path))?;

        tracing::info!(
            catalogs = config.catalogs.len(),
            "Loaded service config from {:?}",
            path
        );
        Ok(config)
    }

    /// Catalog ids in preference order.
    pub fn preference_order(&self) -> Vec<String> {
        if self.preference_order.is_empty() {
            self.catalogs.iter().map(|c| c.id.clone()).collect()
        } else {
            self.preference_order.clone()
        }
    }

    /// Settings handed to the query engine.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            limits: self.limits.clone(),
            excluded_attributes: self.excluded_attributes.clone(),
        }
    }
}

/// Where one catalog lives on disk.
///
/// Summary: `{data_dir}/{directory}/output/{summary_file}`.
/// Details: `{data_dir}/{directory}/output/{detail_dir}/{event}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogSource {
    /// Catalog id used in request paths (e.g. `sne`).
    pub id: String,

    /// Repository directory under `data_dir`.
    pub directory: String,

    #[serde(default = "default_summary_file")]
    pub summary_file: String,

    #[serde(default = "default_detail_dir")]
    pub detail_dir: String,
}

impl CatalogSource {
    pub fn new(id: &str, directory: &str, summary_file: &str) -> Self {
        Self {
            id: id.to_string(),
            directory: directory.to_string(),
            summary_file: summary_file.to_string(),
            detail_dir: default_detail_dir(),
        }
    }

    pub fn summary_path(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join(&self.directory)
            .join("output")
            .join(&self.summary_file)
    }

    /// Detail record path; `/` in event names becomes `_`.
    pub fn detail_path(&self, data_dir: &Path, event: &str) -> PathBuf {
        data_dir
            .join(&self.directory)
            .join("output")
            .join(&self.detail_dir)
            .join(format!("{}.json", event.replace('/', "_")))
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_catalogs() -> Vec<CatalogSource> {
    vec![
        CatalogSource::new("sne", "supernovae", "catalog.min.json"),
        CatalogSource::new("tde", "tidaldisruptions", "catalog.min.json"),
        CatalogSource::new("kilonova", "kilonovae", "catalog.min.json"),
        CatalogSource::new("faststars", "faststars", "catalog.min.json"),
        CatalogSource::new("sne-graveyard", "supernovae", "bones.min.json"),
        CatalogSource::new("tde-graveyard", "tidaldisruptions", "bones.min.json"),
        CatalogSource::new("kilonova-graveyard", "kilonovae", "bones.min.json"),
        CatalogSource::new("faststars-graveyard", "faststars", "bones.min.json"),
    ]
}

fn default_summary_file() -> String {
    "catalog.min.json".to_string()
}

fn default_detail_dir() -> String {
    "json".to_string()
}

fn default_excluded_attributes() -> Vec<String> {
    vec![DEFAULT_EXCLUDED_ATTRIBUTE.to_string()]
}

fn default_request_timeout_secs() -> u64 {
    30
}
