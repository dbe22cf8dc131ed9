//! Panel HTTP routes

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Html,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{Exchange, SharedPanel};
use crate::llm::ModelState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// System status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub model: ModelState,
    pub voice_enabled: bool,
    pub models_dir: String,
}

/// Model listing response
#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub current: ModelState,
}

/// Model selection request
#[derive(Deserialize)]
pub struct SelectRequest {
    pub file: String,
}

/// Model selection response
#[derive(Serialize)]
pub struct SelectResponse {
    pub status: &'static str,
    pub file: String,
}

/// Error body for failed requests
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// The embedded panel page
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../ui/index.html"))
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// System status including the model registry state
async fn status(State(state): State<SharedPanel>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        model: state.registry.state().await,
        voice_enabled: state.voice_enabled,
        models_dir: state.catalog.dir().display().to_string(),
    })
}

/// List the model catalog and the current selection state
async fn list_models(State(state): State<SharedPanel>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: state.catalog.list(),
        current: state.registry.state().await,
    })
}

/// Select a model file from the catalog and start loading it
async fn select_model(
    State(state): State<SharedPanel>,
    Json(req): Json<SelectRequest>,
) -> Result<(StatusCode, Json<SelectResponse>), (StatusCode, Json<ErrorResponse>)> {
    let path = state.catalog.path_of(&req.file).map_err(|e| {
        tracing::warn!(file = %req.file, error = %e, "model selection rejected");
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    state.registry.select(req.file.clone(), path).await;

    Ok((
        StatusCode::ACCEPTED,
        Json(SelectResponse {
            status: "loading",
            file: req.file,
        }),
    ))
}

/// The last completed exchange
async fn last_exchange(State(state): State<SharedPanel>) -> Json<Option<Exchange>> {
    Json(state.exchange.read().await.clone())
}

/// Build the routes router
pub fn router(state: SharedPanel) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/models", get(list_models))
        .route("/api/models/select", post(select_model))
        .route("/api/exchange", get(last_exchange))
        .with_state(state)
}
