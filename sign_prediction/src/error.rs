use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ndarray::ShapeError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Malformed request envelope: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Image read failed: {0}")]
    ImageRead(#[from] std::io::Error),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Model output length mismatch: expected {expected}, got {got}")]
    UnexpectedOutput { expected: usize, got: usize },

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Model session mutex poisoned")]
    SessionPoisoned,
}

impl IntoResponse for InferenceError {
    fn into_response(self) -> Response {
        let status = match self {
            InferenceError::MalformedRequest(_)
            | InferenceError::Base64(_)
            | InferenceError::ImageDecode(_)
            | InferenceError::ImageRead(_)
            | InferenceError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_errors_map_to_bad_request() {
        let error = InferenceError::MalformedUpload("no file field".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_map_to_server_error() {
        let error = InferenceError::UnexpectedOutput {
            expected: 58,
            got: 1000,
        };

        assert_eq!(
            error.to_string(),
            "Model output length mismatch: expected 58, got 1000"
        );
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
