use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Why a model response could not be turned into a validated JSON value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("response is neither JSON nor contains a fenced code block")]
    NoJson,

    #[error("fenced code block is not valid JSON: {0}")]
    InvalidFencedJson(String),

    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    #[error("JSON does not match the expected shape: {0}")]
    Shape(String),
}

/// Failure of a single extractor call. Recovered locally by the pipeline.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("Failed to initialize extractor: {0}")]
    Initialization(String),

    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model endpoint returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Model returned an empty completion")]
    EmptyCompletion,

    #[cfg(feature = "engine-ocrs")]
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[cfg(feature = "engine-ocrs")]
    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("Invalid model JSON: {0}")]
    Schema(#[from] SchemaError),
}

impl ExtractorError {
    /// Whether another attempt of the same call could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Request(_) => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Request-level failure surfaced to the caller
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("no content")]
    NoContent,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds the {max} byte limit")]
    PayloadTooLarge { max: usize },

    #[error("Analysis failed: {0}")]
    Upstream(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AnalyzeError::NoContent => (StatusCode::BAD_REQUEST, "NO_CONTENT"),
            AnalyzeError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            AnalyzeError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            AnalyzeError::Upstream(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ExtractorError::Timeout(30).is_transient());
        assert!(ExtractorError::Upstream {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(ExtractorError::Upstream {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!ExtractorError::Upstream {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!ExtractorError::Schema(SchemaError::NoJson).is_transient());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AnalyzeError::NoContent.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AnalyzeError::PayloadTooLarge { max: 10 }
                .into_response()
                .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AnalyzeError::Upstream("both extractors failed".into())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
