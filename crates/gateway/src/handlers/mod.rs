//! Request handlers and boundary error rendering

pub mod ask;
pub mod documents;
pub mod health;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use regex_lite::Regex;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::OnceLock;
use verdant_common::errors::{AppError, ErrorCode};

/// Request correlation id, taken from the request-id layer
pub struct Rid(pub String);

impl<S> FromRequestParts<S> for Rid
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let rid = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Ok(Rid(rid))
    }
}

/// Boundary error: an [`AppError`] plus the request correlation id.
///
/// Every error response carries `{ok, rid, stage, code, message}` so a
/// failure is diagnosable without ambiguity about which stage failed.
pub struct ApiError {
    rid: String,
    error: AppError,
}

#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    rid: String,
    stage: &'static str,
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(rid: &str, error: AppError) -> Self {
        Self {
            rid: rid.to_string(),
            error,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = self.error.to_string();

        if self.error.is_server_error() {
            tracing::error!(
                rid = %self.rid,
                stage = self.error.stage(),
                code = ?self.error.code(),
                error = %message,
                "request failed"
            );
        } else {
            tracing::warn!(
                rid = %self.rid,
                stage = self.error.stage(),
                code = ?self.error.code(),
                error = %message,
                "request rejected"
            );
        }

        let body = ErrorBody {
            ok: false,
            rid: self.rid,
            stage: self.error.stage(),
            code: self.error.code(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

/// Scrub bearer tokens and signed-URL tokens before logging upstream
/// payloads or URLs.
pub fn redact(text: &str) -> String {
    static BEARER: OnceLock<Regex> = OnceLock::new();
    static TOKEN: OnceLock<Regex> = OnceLock::new();

    let bearer = BEARER
        .get_or_init(|| Regex::new(r"Bearer [A-Za-z0-9._\-]+").expect("static pattern"));
    let token = TOKEN.get_or_init(|| Regex::new(r#"token=[^\s&"]+"#).expect("static pattern"));

    let scrubbed = bearer.replace_all(text, "Bearer [redacted]");
    token.replace_all(&scrubbed, "token=[redacted]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_bearer_token() {
        let input = "Authorization: Bearer sk-abc123.def";
        assert_eq!(redact(input), "Authorization: Bearer [redacted]");
    }

    #[test]
    fn test_redact_signed_url_token() {
        let input = "https://store/object/sign/a.pdf?token=eyJhbGci&x=1";
        assert_eq!(redact(input), "https://store/object/sign/a.pdf?token=[redacted]&x=1");
    }

    #[test]
    fn test_redact_leaves_plain_text() {
        assert_eq!(redact("nothing secret here"), "nothing secret here");
    }

    #[test]
    fn test_error_body_shape() {
        let api_err = ApiError::new("rid-1", AppError::DocNotFound { id: "x".into() });
        let response = api_err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
