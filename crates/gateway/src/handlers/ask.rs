//! Ask handler: one question in, grounded answer with citations out

use crate::handlers::{ApiError, Rid};
use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;
use verdant_common::errors::{AppError, ErrorCode};
use verdant_query::Citation;

#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 1000))]
    pub question: String,

    /// Optional result-count hint; clamped server-side
    pub k: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub general_intent: bool,
}

pub async fn ask(
    State(state): State<AppState>,
    Rid(rid): Rid,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    request.validate().map_err(|e| {
        let code = if request.question.trim().is_empty() {
            ErrorCode::MissingQuestion
        } else {
            ErrorCode::ValidationError
        };
        ApiError::new(&rid, AppError::validation(code, e.to_string()))
    })?;

    tracing::info!(rid = %rid, k = ?request.k, "question received");

    let report = state
        .query
        .ask(&request.question, request.k)
        .await
        .map_err(|e| ApiError::new(&rid, e))?;

    Ok(Json(AskResponse {
        answer: report.answer,
        citations: report.citations,
        general_intent: report.intent.is_general(),
    }))
}
