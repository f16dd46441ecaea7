//! Application state for the OAC API.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use oac_protocol::{CatalogSnapshot, DetailStore, EngineOptions, QueryError};

use crate::config::ApiConfig;
use crate::loader::{load_snapshot, FileDetailStore};

/// Shared application state.
pub struct AppState {
    /// Service configuration.
    pub config: ApiConfig,

    /// Engine settings derived from the configuration.
    pub options: EngineOptions,

    /// Source of full per-event records.
    pub details: Arc<dyn DetailStore>,

    /// Current catalog snapshot, `None` until the first successful load.
    snapshot: RwLock<Option<Arc<CatalogSnapshot>>>,

    /// Version handed to the next loaded snapshot.
    next_version: AtomicU64,
}

impl AppState {
    /// Create state reading catalogs from `config.data_dir`. No snapshot
    /// is loaded yet; call [`AppState::reload`].
    pub fn new(config: ApiConfig) -> Self {
        let details = Arc::new(FileDetailStore::new(&config));
        Self::with_details(config, details)
    }

    /// Create state with a custom detail store.
    pub fn with_details(config: ApiConfig, details: Arc<dyn DetailStore>) -> Self {
        Self {
            options: config.engine_options(),
            config,
            details,
            snapshot: RwLock::new(None),
            next_version: AtomicU64::new(1),
        }
    }

    /// Install an already-built snapshot and return the one now served.
    ///
    /// A snapshot older than the current one is discarded, so concurrent
    /// reloads finishing out of order never move the version backwards.
    pub async fn install(&self, snapshot: CatalogSnapshot) -> Arc<CatalogSnapshot> {
        self.swap_in(Arc::new(snapshot)).await
    }

    async fn swap_in(&self, snapshot: Arc<CatalogSnapshot>) -> Arc<CatalogSnapshot> {
        let mut current = self.snapshot.write().await;
        if let Some(live) = current.as_ref() {
            if live.version() > snapshot.version() {
                tracing::warn!(
                    live = live.version(),
                    stale = snapshot.version(),
                    "Discarding snapshot older than the one being served"
                );
                return Arc::clone(live);
            }
        }
        *current = Some(Arc::clone(&snapshot));
        snapshot
    }

    /// The snapshot a request should run against.
    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, QueryError> {
        self.snapshot.read().await.clone().ok_or_else(|| {
            QueryError::SnapshotUnavailable("catalogs have not been loaded".to_string())
        })
    }

    /// Rebuild the snapshot from disk and swap it in.
    ///
    /// On failure the current snapshot stays in place. Returns the snapshot
    /// served afterwards, which is a newer one when another reload
    /// finished first.
    pub async fn reload(&self) -> Result<Arc<CatalogSnapshot>> {
        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let config = self.config.clone();
        let snapshot = tokio::task::spawn_blocking(move || load_snapshot(&config, version))
            .await
            .context("Catalog loading task failed")??;

        Ok(self.swap_in(Arc::new(snapshot)).await)
    }
}
