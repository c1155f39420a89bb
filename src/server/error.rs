use axum::{
    Json,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Request-level failures.
///
/// Image routes answer in plain text because the display client only looks
/// at the status; JSON routes answer `{"error": "<code>"}`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad stream id")]
    BadStreamId,

    #[error("image failed: {0}")]
    Image(String),

    #[error("collage failed: {0}")]
    Collage(String),

    #[error("no_active_set")]
    NoActiveSet,

    #[error("exclude refresh failed: {0}")]
    ExcludeRefresh(String),

    #[error("{code}: {detail}")]
    Failed { code: &'static str, detail: String },
}

impl AppError {
    pub fn failed(code: &'static str, err: impl std::fmt::Display) -> Self {
        AppError::Failed {
            code,
            detail: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    err: Option<String>,
}

fn plain(status: StatusCode, body: &'static str) -> Response {
    (status, [(CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn json(status: StatusCode, error: &'static str, err: Option<String>) -> Response {
    (status, Json(ErrorBody { error, err })).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if !matches!(self, AppError::BadStreamId | AppError::NoActiveSet) {
            warn!(error = %self, "request failed");
        }

        match self {
            AppError::BadStreamId => plain(StatusCode::BAD_REQUEST, "Bad stream id"),
            AppError::Image(_) => plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
            AppError::Collage(_) => plain(StatusCode::INTERNAL_SERVER_ERROR, "Collage error"),
            AppError::NoActiveSet => json(StatusCode::BAD_REQUEST, "no_active_set", None),
            AppError::ExcludeRefresh(detail) => json(
                StatusCode::INTERNAL_SERVER_ERROR,
                "exclude_refresh_failed",
                Some(detail),
            ),
            AppError::Failed { code, .. } => json(StatusCode::INTERNAL_SERVER_ERROR, code, None),
        }
    }
}
