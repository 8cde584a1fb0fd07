use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kernel::ErrorBody;

use crate::domain::StoreError;

/// Application-level error, mapped onto the uniform `{error, details?}`
/// response shape.
///
/// Oversized request bodies never reach this type; the body limit layer
/// answers 413 before handler logic runs.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed input, 400
    Validation(String),
    /// Delete outside the managed prefix, 403
    Forbidden(String),
    /// Any failure from the backing store, 500, message passed through
    Store {
        context: &'static str,
        source: StoreError,
    },
}

impl ApiError {
    pub fn store(context: &'static str, source: StoreError) -> Self {
        Self::Store { context, source }
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            ApiError::Validation(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    details: None,
                },
            ),
            ApiError::Forbidden(message) => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    error: message,
                    details: None,
                },
            ),
            ApiError::Store { context, source } => {
                tracing::error!("{context}: {source}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: context.to_string(),
                        details: Some(source.to_string()),
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}
