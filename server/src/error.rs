use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tts_core::TtsError;

/// API Error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    UnknownVoice(String),

    #[error("{0}")]
    TtsError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<TtsError> for ApiError {
    fn from(e: TtsError) -> Self {
        match e {
            TtsError::UnknownVoice(_) => ApiError::UnknownVoice(e.to_string()),
            TtsError::Inference(_) | TtsError::Encoding(_) => ApiError::TtsError(e.to_string()),
            TtsError::Worker(_) => ApiError::InternalError(e.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::UnknownVoice(_) => StatusCode::BAD_REQUEST,
            ApiError::TtsError(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            ApiError::InvalidInput(msg) | ApiError::UnknownVoice(msg) | ApiError::NotFound(msg) => msg,
            ApiError::TtsError(msg) => {
                tracing::error!("TTS error: {}", msg);
                msg
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg
            }
        };

        let body = Json(ErrorResponse {
            detail,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
