//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub store: bool,
    pub embedding: bool,
    pub completion: bool,
    pub parsing: bool,
}

/// Liveness probe - always healthy if the server is running
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.observability.service_name.clone(),
        version: verdant_common::VERSION.to_string(),
    })
}

/// Readiness probe - reports which collaborators are configured
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let checks = ReadyChecks {
        store: !state.config.store.url.is_empty() && !state.config.store.service_key.is_empty(),
        embedding: !state.config.embedding.api_key.is_empty(),
        completion: !state.config.completion.api_key.is_empty(),
        parsing: !state.config.parsing.api_key.is_empty(),
    };

    let all_ready = checks.store && checks.embedding && checks.completion && checks.parsing;

    Json(ReadyResponse {
        status: if all_ready { "ready" } else { "not_ready" }.to_string(),
        checks,
    })
}
