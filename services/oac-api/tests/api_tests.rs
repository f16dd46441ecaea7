//! Router-level tests against an on-disk fixture catalog tree.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use oac_api::app::build_router;
use oac_api::config::{ApiConfig, CatalogSource};
use oac_api::content_negotiation::TRUNCATED_HEADER;
use oac_api::state::AppState;
use oac_protocol::ResourceLimits;
use test_utils::{layout, CatalogTree};

// ============================================================================
// Helpers
// ============================================================================

fn tree_config(tree: &CatalogTree) -> ApiConfig {
    ApiConfig {
        data_dir: tree.root().to_path_buf(),
        catalogs: vec![
            CatalogSource::new(layout::SNE, layout::SNE_DIRECTORY, layout::SUMMARY_FILE),
            CatalogSource::new(
                layout::KILONOVA,
                layout::KILONOVA_DIRECTORY,
                layout::SUMMARY_FILE,
            ),
            CatalogSource::new(
                layout::SNE_GRAVEYARD,
                layout::SNE_DIRECTORY,
                layout::GRAVEYARD_FILE,
            ),
        ],
        ..Default::default()
    }
}

async fn loaded_app(config: ApiConfig) -> Router {
    let state = Arc::new(AppState::new(config));
    state.reload().await.expect("fixture catalogs load");
    build_router(state, None)
}

async fn send(app: Router, method: Method, uri: &str, body: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, "").await
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_single_event_quantity() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app, "/sne/SN2014J/redshift").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let json = body_json(response).await;
    let rows = json["SN2014J"]["redshift"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["value"], "0.000677");
}

#[tokio::test]
async fn test_event_prefix_and_detail_fallback() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app, "/sne/event/SN2014J/photometry/magnitude+e_magnitude+band?complete").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let rows = json["SN2014J"]["photometry"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["band"], "B");
}

#[tokio::test]
async fn test_csv_download() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app, "/sne/SN2014J/photometry/time+magnitude?format=csv&download").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment;"));

    let text = body_text(response).await;
    assert!(text.starts_with("event,quantity,time,magnitude\n"));
    assert_eq!(text.lines().count(), 5);
}

#[tokio::test]
async fn test_accept_header_selects_tsv() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let request = Request::builder()
        .uri("/sne/SN2011fe/host")
        .header(header::ACCEPT, "text/tab-separated-values")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/tab-separated-values");
    let text = body_text(response).await;
    assert!(text.contains("SN2011fe\thost\tM101"));
}

#[tokio::test]
async fn test_post_body_arguments() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = send(
        app,
        Method::POST,
        "/sne/all/lumdist+claimedtype",
        r#"{"lumdist": null, "claimedtype": "ia"}"#,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let events: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(events.len(), 2);
    assert!(json.get("SN2014J").is_some());
    assert!(json.get("SN2011fe").is_some());
}

#[tokio::test]
async fn test_post_invalid_body() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = send(app, Method::POST, "/sne/SN2014J/redshift", "{oops").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_event_is_empty_object() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app, "/sne/SN2999zz/redshift").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "{}");
}

#[tokio::test]
async fn test_catalog_root_requires_event() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app.clone(), "/sne").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["type"], "urn:oac:error:bad-path");

    let response = get(app, "/sne?event=SN2014J&quantity=host").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["SN2014J"]["host"][0]["value"], "M82");
}

#[tokio::test]
async fn test_invalid_argument_as_plain_text() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app, "/sne/catalog/host?ra=1&dec=1&radius=abc&format=csv").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert!(body_text(response).await.contains("radius"));
}

#[tokio::test]
async fn test_truncation_header() {
    let tree = CatalogTree::standard().unwrap();
    let config = ApiConfig {
        limits: ResourceLimits {
            max_rows: 2,
            ..Default::default()
        },
        ..tree_config(&tree)
    };
    let app = loaded_app(config).await;

    let response = get(app, "/sne/all/claimedtype").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[TRUNCATED_HEADER], "max-rows=2");
}

#[tokio::test]
async fn test_expensive_request_rejected() {
    let tree = CatalogTree::standard().unwrap();
    let config = ApiConfig {
        limits: ResourceLimits {
            max_expensive_events: 1,
            ..Default::default()
        },
        ..tree_config(&tree)
    };
    let app = loaded_app(config).await;

    let response = get(app.clone(), "/sne/all/spectra/data").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["type"], "urn:oac:error:too-expensive");

    let response = get(app, "/sne/SN2014J/spectra/data?item=0").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Catalog management
// ============================================================================

#[tokio::test]
async fn test_not_loaded_is_unavailable() {
    let tree = CatalogTree::standard().unwrap();
    let app = build_router(Arc::new(AppState::new(tree_config(&tree))), None);

    let response = get(app.clone(), "/sne/SN2014J/redshift").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = get(app.clone(), "/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = send(app.clone(), Method::POST, "/reload", "").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["version"], 1);

    let response = get(app, "/sne/SN2014J/redshift").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_catalogs() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app, "/catalogs").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["version"], 1);
    let ids: Vec<&str> = json["catalogs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["sne", "kilonova", "sne-graveyard"]);
    assert_eq!(json["catalogs"][0]["events"], 4);
}

#[tokio::test]
async fn test_health_endpoints() {
    let tree = CatalogTree::standard().unwrap();
    let app = loaded_app(tree_config(&tree)).await;

    let response = get(app.clone(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = get(app.clone(), "/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["snapshot_version"], 1);

    let response = get(app, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}
