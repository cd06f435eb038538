use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failures raised by the interaction and moderation core.
///
/// Every variant carries the human-readable message shown to the caller.
#[derive(Debug, Error)]
pub enum AppError {
    /// Referenced article, comment or parent comment is absent.
    #[error("{0}")]
    NotFound(String),

    /// Re-auditing a non-pending comment, an unrecognized audit target, or a
    /// batch in which nothing could be processed.
    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    PermissionDenied(String),

    /// Empty batch input, blank content, or a reply target that does not
    /// match the parent author.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let Self::Database(ref e) = self {
            tracing::error!("database error: {}", e);
        }
        (status, Json(serde_json::json!({"detail": self.to_string()}))).into_response()
    }
}
