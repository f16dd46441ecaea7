//! Health and metrics handlers.

use std::sync::Arc;
use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<usize>,
}

/// GET /health - Basic health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /ready - Readiness check (a snapshot has been loaded)
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let response = match state.snapshot().await {
        Ok(snapshot) => ReadyResponse {
            ready: true,
            snapshot_version: Some(snapshot.version()),
            events: Some(snapshot.total_events()),
        },
        Err(_) => ReadyResponse {
            ready: false,
            snapshot_version: None,
            events: None,
        },
    };

    let status = if response.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response)).into_response()
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(handle: Option<Extension<PrometheusHandle>>) -> Response {
    let body = handle.map(|Extension(h)| h.render()).unwrap_or_default();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use oac_protocol::{CatalogSnapshot, NoDetailStore};

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "ok");
    }

    #[tokio::test]
    async fn test_ready_handler_tracks_snapshot() {
        let state = Arc::new(AppState::with_details(
            ApiConfig::default(),
            Arc::new(NoDetailStore),
        ));
        let response = ready_handler(Extension(Arc::clone(&state))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.install(CatalogSnapshot::builder().build()).await;
        let response = ready_handler(Extension(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let response = metrics_handler(None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
