use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::pipeline::PipelineError;
use crate::registration::ValidationError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Incorrect password. Please try again.")]
    WrongPassword,

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("Registration summary is not enabled")]
    SummaryDisabled,

    #[error("{0}")]
    UploadTimeout(String),

    #[error("{0}")]
    UploadFailed(String),

    /// Backend failure; `message` is what the client sees
    #[error("{message}")]
    Storage {
        message: &'static str,
        source: StorageError,
    },

    #[error("Failed to generate PDF: {0}")]
    Pipeline(#[from] PipelineError),
}

impl AppError {
    pub fn storage(message: &'static str) -> impl FnOnce(StorageError) -> AppError {
        move |source| AppError::Storage { message, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::WrongPassword | AppError::SessionExpired => StatusCode::UNAUTHORIZED,
            AppError::SummaryDisabled => StatusCode::FORBIDDEN,
            AppError::UploadTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::UploadFailed(_) | AppError::Storage { .. } | AppError::Pipeline(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Storage { message, source } => error!("{message}: {source}"),
            other if status.is_server_error() => error!("{other}"),
            _ => {}
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
