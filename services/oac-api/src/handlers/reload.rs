//! Snapshot reload handler.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use oac_protocol::{ExceptionResponse, OutputFormat};

use crate::content_negotiation::exception_response;
use crate::handlers::catalogs::catalog_list;
use crate::state::AppState;

/// POST /reload - Rebuild the catalog snapshot from disk
pub async fn reload_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.reload().await {
        Ok(snapshot) => {
            metrics::counter!("oac_reloads_total", "outcome" => "ok").increment(1);
            Json(catalog_list(&snapshot)).into_response()
        }
        Err(e) => {
            tracing::error!("Catalog reload failed: {:#}", e);
            metrics::counter!("oac_reloads_total", "outcome" => "error").increment(1);
            exception_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ExceptionResponse::internal_error(format!("Catalog reload failed: {:#}", e)),
                OutputFormat::Json,
            )
        }
    }
}
