//! Router construction.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

/// Build the service router.
///
/// `prometheus` is `None` when no recorder is installed (tests).
pub fn build_router(state: Arc<AppState>, prometheus: Option<PrometheusHandle>) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    let router = Router::new()
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Catalog management
        .route("/catalogs", get(handlers::catalogs::list_catalogs_handler))
        .route("/reload", post(handlers::reload::reload_handler))
        // Queries
        .route("/:catalog", get(handlers::query::catalog_root_handler))
        .route(
            "/:catalog/*path",
            get(handlers::query::query_handler).post(handlers::query::query_post_handler),
        );

    let router = match prometheus {
        Some(handle) => router.layer(Extension(handle)),
        None => router,
    };

    router
        .layer(Extension(state))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}
