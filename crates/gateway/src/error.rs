use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use inference::{InferenceError, LoadError};
use serde::Serialize;
use thiserror::Error;

/// The request did not carry a usable image. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Image data is required")]
    Missing,

    #[error("Image payload is empty")]
    Empty,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Invalid base64 image data: {0}")]
    Base64(String),

    #[error("Invalid image file: {0}")]
    Image(String),
}

/// Everything a detection request can fail with.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DetectError {
    pub fn kind(&self) -> &'static str {
        match self {
            DetectError::Decode(_) => "DecodeError",
            DetectError::Load(_) => "LoadError",
            DetectError::Inference(_) => "InferenceError",
            DetectError::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DetectError::Decode(_) => StatusCode::BAD_REQUEST,
            DetectError::Load(_) => StatusCode::SERVICE_UNAVAILABLE,
            DetectError::Inference(_) | DetectError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            error: self.kind(),
            detail: self.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: &'static str,
    pub detail: String,
}

impl IntoResponse for DetectError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Detection failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "Rejected request");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_each_kind_maps_to_its_status() {
        let cases = [
            (DetectError::from(DecodeError::Empty), StatusCode::BAD_REQUEST, "DecodeError"),
            (
                DetectError::from(LoadError::Timeout(Duration::from_secs(1))),
                StatusCode::SERVICE_UNAVAILABLE,
                "LoadError",
            ),
            (
                DetectError::from(InferenceError::InvalidOutput("rank 2".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "InferenceError",
            ),
        ];

        for (err, status, kind) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn test_body_carries_underlying_message() {
        let err = DetectError::from(LoadError::ModelNotFound("weights/best.onnx".into()));
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": "LoadError",
                "detail": "Model not found: weights/best.onnx",
            })
        );
    }
}
