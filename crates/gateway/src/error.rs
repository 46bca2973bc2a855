use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use detector::DetectorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("model unavailable: {0}")]
    ModelLoad(#[source] DetectorError),

    #[error("prediction failed: {0}")]
    Inference(#[source] DetectorError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("not found")]
    NotFound,
}

impl From<DetectorError> for AppError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::ModelLoad { .. } | DetectorError::InvalidRegistry(_) => {
                AppError::ModelLoad(err)
            }
            DetectorError::Io(e) => AppError::Io(e),
            other => AppError::Inference(other),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ModelLoad(_) | AppError::Inference(_) | AppError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Multipart(err) => err.status(),
            AppError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            AppError::ModelLoad(_) => "The selected model could not be loaded.",
            AppError::Inference(_) => "The image could not be processed.",
            AppError::Io(_) => "Internal server error.",
            AppError::Multipart(err) if err.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "Upload too large."
            }
            AppError::Multipart(_) => "Malformed upload.",
            AppError::NotFound => "Not found.",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, self.public_message()).into_response()
    }
}
