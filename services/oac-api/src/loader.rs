//! Catalog loading from the on-disk repository layout.

use anyhow::{Context, Result};
use chrono::Utc;
use oac_protocol::{Catalog, CatalogSnapshot, DetailStore, Event};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ApiConfig, CatalogSource};

/// Build a snapshot from every configured summary file.
///
/// A missing summary file leaves its catalog empty. An unreadable or
/// malformed one fails the whole load so the previous snapshot stays live.
pub fn load_snapshot(config: &ApiConfig, version: u64) -> Result<CatalogSnapshot> {
    let started = Instant::now();
    let mut builder = CatalogSnapshot::builder()
        .version(version)
        .loaded_at(Utc::now())
        .preference_order(config.preference_order());

    for source in &config.catalogs {
        builder = builder.catalog(load_catalog(source, &config.data_dir)?);
    }

    let snapshot = builder.build();
    tracing::info!(
        version,
        catalogs = snapshot.catalogs().len(),
        events = snapshot.total_events(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Loaded catalog snapshot"
    );
    Ok(snapshot)
}

fn load_catalog(source: &CatalogSource, data_dir: &Path) -> Result<Catalog> {
    let path = source.summary_path(data_dir);
    if !path.exists() {
        tracing::warn!(
            catalog = %source.id,
            "Summary file {:?} does not exist, catalog will be empty",
            path
        );
        return Ok(Catalog::new(source.id.clone(), Vec::new()));
    }

    let content =
        std::fs::read_to_string(&path).with_context(|| format!("Failed to read: {:?}", path))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog {}: {:?}", source.id, path))?;

    let catalog = Catalog::from_json(&source.id, &document);
    tracing::debug!(catalog = %source.id, events = catalog.len(), "Loaded catalog");
    Ok(catalog)
}

/// Reads per-event detail records lazily from disk.
pub struct FileDetailStore {
    data_dir: PathBuf,
    sources: HashMap<String, CatalogSource>,
}

impl FileDetailStore {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            data_dir: config.data_dir.clone(),
            sources: config
                .catalogs
                .iter()
                .map(|c| (c.id.clone(), c.clone()))
                .collect(),
        }
    }

    fn read(&self, path: &Path) -> Result<Value> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse: {:?}", path))
    }
}

impl DetailStore for FileDetailStore {
    fn load(&self, catalog: &str, event: &str) -> Option<Event> {
        let source = self.sources.get(catalog)?;
        let path = source.detail_path(&self.data_dir, event);
        if !path.exists() {
            return None;
        }
        match self.read(&path) {
            Ok(document) => Event::from_json(catalog, unwrap_record(&document, event)),
            Err(e) => {
                tracing::warn!(catalog, event, "Skipping detail record: {:#}", e);
                None
            }
        }
    }
}

/// Detail files are usually `{name: record}`; bare records are accepted too.
fn unwrap_record<'a>(document: &'a Value, event: &str) -> &'a Value {
    match document.as_object() {
        Some(map) if !map.contains_key("name") => map
            .get(event)
            .or_else(|| map.values().next())
            .unwrap_or(document),
        _ => document,
    }
}
