use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Every failure an HTTP handler can surface.
///
/// The rendered body is always `{"message": "..."}`. Storage and upstream
/// details are logged but never returned to the client.
///
/// | Variant                                   | Status |
/// |-------------------------------------------|--------|
/// | Validation, InvalidToken                  | 400    |
/// | Duplicate, AlreadySigned, MissingSignature| 400    |
/// | SignedNoteLocked                          | 400    |
/// | Unauthorized                              | 401    |
/// | NotFound                                  | 404    |
/// | Conflict                                  | 409    |
/// | Upstream, Database, Internal              | 500    |
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("{0}")]
    Unauthorized(String),

    /// Missing records and records the caller cannot see are reported the same way.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("The delivery note is already signed")]
    AlreadySigned,

    #[error("No signature attached")]
    MissingSignature,

    #[error("Cannot delete a signed delivery note")]
    SignedNoteLocked,

    #[error("{0}")]
    Conflict(String),

    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidToken
            | AppError::Duplicate(_)
            | AppError::AlreadySigned
            | AppError::MissingSignature
            | AppError::SignedNoteLocked => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Upstream(_) => "The operation could not be completed, try again".to_string(),
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = json!({ "message": self.public_message() });
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
