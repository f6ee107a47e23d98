//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! failure is rendered to HTTP clients.

use crate::config::ConfigError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use study_core::{CoreError, PortError};
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A domain outcome reported by one of the core services.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller has used up its allowance on a rate-limited route.
    #[error("{0}")]
    RateLimited(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        Self::Core(err.into())
    }
}

// Requests axum cannot decode are reported like any other bad input.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Core(CoreError::InvalidInput(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Core(CoreError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Core(CoreError::InvalidInput(rejection.body_text()))
    }
}

/// The JSON body of every failed request.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    /// Machine-readable failure kind, e.g. `InvalidCode`.
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Core(core) => {
                let status = match core {
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::InvalidInput(_)
                    | CoreError::SessionExpired
                    | CoreError::CodeExpired
                    | CoreError::InvalidCode
                    | CoreError::InvalidResetToken => StatusCode::BAD_REQUEST,
                    CoreError::AlreadyRegistered(_) => StatusCode::CONFLICT,
                    CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
                    CoreError::DispatchFailed(_) => StatusCode::BAD_GATEWAY,
                    CoreError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, core.kind())
            }
            Self::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "RateLimited"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            match &self {
                Self::Core(CoreError::DispatchFailed(_)) => {
                    "Failed to send email or message. Please try again.".to_string()
                }
                _ => "An error occurred. Please try again.".to_string(),
            }
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            success: false,
            error: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
