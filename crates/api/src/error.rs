use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bodyline_core::error::CoreError;
use bodyline_events::source::SourceError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`SourceError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `bodyline_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The event source could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },

            // --- Event source errors ---
            AppError::Source(err) => match err {
                SourceError::Io { .. } | SourceError::Unavailable(_) => {
                    tracing::error!(error = %err, "Event source unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "SOURCE_UNAVAILABLE",
                        "Health events are currently unavailable".to_string(),
                    )
                }
                SourceError::Parse { .. } => {
                    tracing::error!(error = %err, "Event source returned unreadable data");
                    (
                        StatusCode::BAD_GATEWAY,
                        "SOURCE_INVALID",
                        "Health events could not be parsed".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
