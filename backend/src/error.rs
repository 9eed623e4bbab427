use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::{ErrorResponse, UploadResponse};

use crate::pipeline::model::InferenceError;

/// Failures that end a single `/upload` request.
#[derive(Debug, thiserror::Error)]
pub enum DiagnosisError {
    #[error("No file part")]
    MissingFilePart,
    #[error("No selected file")]
    NoFileSelected,
    #[error("Malformed upload: {0}")]
    Multipart(String),
    #[error("Unreadable image: {0}")]
    UnreadableImage(String),
    #[error("Tensor shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("Classifier produced invalid output: {0}")]
    InvalidOutput(String),
    #[error("Unknown class: {0}")]
    UnknownClass(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<InferenceError> for DiagnosisError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::ShapeMismatch { expected, actual } => {
                DiagnosisError::ShapeMismatch { expected, actual }
            }
            InferenceError::InvalidOutput(reason) => DiagnosisError::InvalidOutput(reason),
            InferenceError::Backend(reason) => DiagnosisError::Inference(reason),
        }
    }
}

impl ResponseError for DiagnosisError {
    fn status_code(&self) -> StatusCode {
        match self {
            DiagnosisError::Inference(_)
            | DiagnosisError::Storage(_)
            | DiagnosisError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Upload failed: {}", self);
        } else {
            log::warn!("Upload rejected: {}", self);
        }
        HttpResponse::build(status)
            .json(UploadResponse::Failure(ErrorResponse::new(self.to_string())))
    }
}

/// Failures that stop the process before it serves anything.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to load model from {path}: {reason}")]
    ModelLoadFailure { path: String, reason: String },
    #[error("Failed to load class registry: {0}")]
    Registry(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
