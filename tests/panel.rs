//! Panel API integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use murmur::config::LlmConfig;
use murmur::panel::{PanelState, SharedPanel};
use murmur::{ModelCatalog, ModelRegistry};
use tower::ServiceExt;

mod common;
use common::setup_catalog;

/// Build panel state over a temp catalog
fn build_test_panel(catalog: ModelCatalog) -> SharedPanel {
    let registry = ModelRegistry::new(LlmConfig::default());
    PanelState::new(catalog, registry, false, None)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_tmp, catalog) = setup_catalog(&[]);
    let app = murmur::panel::router(build_test_panel(catalog));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_status_reports_empty_model() {
    let (_tmp, catalog) = setup_catalog(&["tiny.gguf"]);
    let app = murmur::panel::router(build_test_panel(catalog));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["model"]["state"], "empty");
    assert_eq!(json["voice_enabled"], false);
}

#[tokio::test]
async fn test_models_listing_is_sorted_gguf_only() {
    let (_tmp, catalog) = setup_catalog(&["b.gguf", "a.gguf", "notes.txt"]);
    let app = murmur::panel::router(build_test_panel(catalog));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/models")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["models"], serde_json::json!(["a.gguf", "b.gguf"]));
    assert_eq!(json["current"]["state"], "empty");
}

#[tokio::test]
async fn test_select_unknown_model_is_not_found() {
    let (_tmp, catalog) = setup_catalog(&["a.gguf"]);
    let app = murmur::panel::router(build_test_panel(catalog));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/models/select")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"file":"missing.gguf"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("missing.gguf"));
}

#[tokio::test]
async fn test_select_known_model_starts_load() {
    // The tokenizer stub keeps the background load local; the bogus GGUF
    // bytes make it fail fast without touching the network
    let (_tmp, catalog) = setup_catalog(&["a.gguf", "tokenizer.json"]);
    let panel = build_test_panel(catalog);
    let app = murmur::panel::router(panel.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/models/select")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"file":"a.gguf"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["status"], "loading");
    assert_eq!(json["file"], "a.gguf");

    // The registry observed the selection (the stub file will fail to load,
    // but the selected file name sticks either way)
    match panel.registry.state().await {
        murmur::ModelState::Loading { file }
        | murmur::ModelState::Failed { file, .. }
        | murmur::ModelState::Ready { file } => assert_eq!(file, "a.gguf"),
        murmur::ModelState::Empty => panic!("selection did not reach the registry"),
    }
}

#[tokio::test]
async fn test_exchange_endpoint_round_trip() {
    let (_tmp, catalog) = setup_catalog(&[]);
    let panel = build_test_panel(catalog);

    // Empty at startup
    let app = murmur::panel::router(panel.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/exchange")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::Value::Null);

    // Populated after a recorded exchange
    panel.record_exchange("what time is it", "it's late").await;

    let app = murmur::panel::router(panel.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/exchange")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["you_said"], "what time is it");
    assert_eq!(json["reply"], "it's late");
}

#[tokio::test]
async fn test_index_serves_embedded_panel_page() {
    let (_tmp, catalog) = setup_catalog(&[]);
    let app = murmur::panel::router(build_test_panel(catalog));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("<title>Murmur</title>"));
    assert!(html.contains("model-select"));
}
