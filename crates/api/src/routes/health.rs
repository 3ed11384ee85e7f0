use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Pipelines this instance can serve.
    pub services: Vec<&'static str>,
}

/// GET /health -- returns service status and available pipelines.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut services = vec!["mask", "workflow", "promptmap"];
    if state.face_detector.is_some() {
        services.push("rename");
    }

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        services,
    })
}

/// GET / -- service index.
async fn index() -> Json<Value> {
    Json(json!({
        "name": "lookbook-api",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "mask": "POST /api/v1/mask",
            "mask_health": "GET /api/v1/mask/health",
            "workflow": "POST /api/v1/workflow/process-images",
            "rename": "POST /api/v1/rename/process",
            "promptmap": "POST /api/v1/promptmap/process-images",
            "jobs": "GET /api/v1/jobs",
        }
    }))
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
}
