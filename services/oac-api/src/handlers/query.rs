//! Catalog query handlers.
//!
//! `GET|POST /:catalog/*path` where `path` is `EVENTS[/QUANTITIES[/ATTRIBUTES]]`,
//! optionally prefixed with `event/`. POST bodies carry the same arguments
//! as a JSON object and are merged after the query string.

use axum::{
    extract::{Extension, Path, RawQuery},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

use oac_protocol::{
    args_from_json, parse_query_string, render, ExceptionResponse, OutputFormat, QueryArg,
    QueryEngine, QueryError, QueryRequest,
};

use crate::content_negotiation::{
    exception_response, negotiate_format, query_error_response, query_response,
};
use crate::state::AppState;

/// GET /:catalog/*path
pub async fn query_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((catalog, path)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let args = parse_query_string(raw.as_deref().unwrap_or(""));
    run_query(state, catalog, path, args, &headers).await
}

/// POST /:catalog/*path
pub async fn query_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path((catalog, path)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut args = parse_query_string(raw.as_deref().unwrap_or(""));
    match body_arguments(&body) {
        Ok(extra) => args.extend(extra),
        Err(e) => {
            let format = negotiate_format(&headers, &args);
            return exception_response(
                StatusCode::BAD_REQUEST,
                &ExceptionResponse::bad_request("invalid-body", format!("Invalid JSON body: {}", e)),
                format,
            );
        }
    }
    run_query(state, catalog, path, args, &headers).await
}

/// GET /:catalog
///
/// Only meaningful when the `event` argument names the events.
pub async fn catalog_root_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(catalog): Path<String>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Response {
    let args = parse_query_string(raw.as_deref().unwrap_or(""));
    run_query(state, catalog, String::new(), args, &headers).await
}

fn body_arguments(body: &str) -> Result<Vec<QueryArg>, serde_json::Error> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value = serde_json::from_str(body)?;
    Ok(args_from_json(&value))
}

/// Strip the optional leading `event/` segment.
fn event_path(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.strip_prefix("event/").unwrap_or(path)
}

async fn run_query(
    state: Arc<AppState>,
    catalog: String,
    path: String,
    args: Vec<QueryArg>,
    headers: &HeaderMap,
) -> Response {
    let started = Instant::now();
    let format = negotiate_format(headers, &args);
    let path = event_path(&path).to_string();

    let snapshot = match state.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return rejected(&e, format, started),
    };

    let request = match QueryRequest::parse(&catalog, &path, &args, &state.options.limits) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(catalog = %catalog, path = %path, "Rejected query: {}", e);
            return rejected(&e, format, started);
        }
    };
    let download = request.directives.download;
    let sortby = request.directives.sortby.clone();

    let worker = Arc::clone(&state);
    let joined = tokio::task::spawn_blocking(move || {
        let engine = QueryEngine::new(&snapshot, worker.details.as_ref(), &worker.options);
        engine.execute(&request).map(|result| {
            let body = render(&result, format, sortby.as_deref());
            (result, body)
        })
    })
    .await;

    let (result, body) = match joined {
        Ok(Ok((result, Ok(body)))) => (result, body),
        Ok(Ok((_, Err(e)))) => {
            return failed(format!("Failed to render result: {}", e), format, started)
        }
        Ok(Err(e)) => {
            tracing::debug!(catalog = %catalog, path = %path, "Rejected query: {}", e);
            return rejected(&e, format, started);
        }
        Err(e) => return failed(format!("Query task failed: {}", e), format, started),
    };

    let elapsed = started.elapsed();
    tracing::info!(
        catalog = %catalog,
        path = %path,
        args = args.len(),
        rows = result.rows.len(),
        events = result.event_count(),
        truncated = result.is_truncated(),
        snapshot = result.snapshot_version,
        elapsed_ms = elapsed.as_millis() as u64,
        "Query completed"
    );
    record_metrics(format, "ok", started);
    if result.is_truncated() {
        metrics::counter!("oac_truncated_results_total").increment(1);
    }

    query_response(body, format, download, &path, result.truncation.as_ref())
}

fn rejected(err: &QueryError, format: OutputFormat, started: Instant) -> Response {
    let outcome = match err {
        QueryError::SnapshotUnavailable(_) => "unavailable",
        _ => "rejected",
    };
    record_metrics(format, outcome, started);
    query_error_response(err, format)
}

fn failed(detail: String, format: OutputFormat, started: Instant) -> Response {
    tracing::error!("{}", detail);
    record_metrics(format, "error", started);
    exception_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &ExceptionResponse::internal_error(detail),
        format,
    )
}

fn record_metrics(format: OutputFormat, outcome: &'static str, started: Instant) {
    metrics::counter!("oac_queries_total", "format" => format.extension(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("oac_query_duration_seconds").record(started.elapsed().as_secs_f64());
}
