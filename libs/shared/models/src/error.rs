use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Kind-level classification shared by every cell error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Conflict,
    Provider,
    Unavailable,
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code returned to clients.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Provider => "provider_error",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Provider => StatusCode::BAD_GATEWAY,
            ErrorKind::Unavailable => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    /// Builds the variant matching a cell error's kind.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => AppError::ValidationError(message),
            ErrorKind::NotFound => AppError::NotFound(message),
            ErrorKind::Unauthorized => AppError::Unauthorized(message),
            ErrorKind::Conflict => AppError::Conflict(message),
            ErrorKind::Provider => AppError::ExternalService(message),
            ErrorKind::Unavailable => AppError::Unavailable(message),
            ErrorKind::Internal => AppError::Internal(message),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "auth_required",
            AppError::Unauthorized(_) => ErrorKind::Unauthorized.code(),
            AppError::NotFound(_) => ErrorKind::NotFound.code(),
            AppError::ValidationError(_) => ErrorKind::Validation.code(),
            AppError::Internal(_) => ErrorKind::Internal.code(),
            AppError::Conflict(_) => ErrorKind::Conflict.code(),
            AppError::Unavailable(_) => ErrorKind::Unavailable.code(),
            AppError::ExternalService(_) => ErrorKind::Provider.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> &str {
        match self {
            AppError::Auth(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Internal(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::Unavailable(msg)
            | AppError::ExternalService(msg) => msg,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.message();

        if status.is_server_error() {
            tracing::error!("Error: {} ({}): {}", status, code, message);
        } else {
            tracing::warn!("Request rejected: {} ({}): {}", status, code, message);
        }

        let body = Json(json!({
            "success": false,
            "code": code,
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Malformed bodies are validation failures, whatever axum's own status would be.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
