//! Startup errors and the HTTP mapping of domain failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use courier_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Anything that stops the server from starting or serving.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Could not reach the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying the embedded migrations failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The tracing subscriber or OTLP exporter could not be installed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Binding or serving the listener failed.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// `{error, message}` body of every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable code a client can match on.
    pub error: &'static str,
    /// Human-readable description of the failure.
    pub message: String,
}

/// A `DomainError` on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

fn classify(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::AggregateNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::Infrastructure(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = classify(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }

        let body = ErrorBody {
            error,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
