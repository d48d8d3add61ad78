use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Voice not found: {0}")]
    VoiceNotFound(String),

    #[error("{0}")]
    Engine(String),

    #[error("TTS generation timed out")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::VoiceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Engine(_) | AppError::Timeout | AppError::Io(_) | AppError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("Request failed: {} - {}", status, message);
        } else {
            tracing::warn!("Request rejected: {} - {}", status, message);
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::InvalidInput("No text provided".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::VoiceNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::Timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::Engine("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            AppError::VoiceNotFound("en_US-amy-low".into()).to_string(),
            "Voice not found: en_US-amy-low"
        );
        assert_eq!(AppError::Timeout.to_string(), "TTS generation timed out");
        assert_eq!(
            AppError::InvalidInput("No text provided".into()).to_string(),
            "No text provided"
        );
    }
}
