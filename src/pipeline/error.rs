//! Request failures and their JSON error envelope.

use serde::Serialize;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::http::{Response, StatusCode};
use crate::transform::TransformError;

/// Why a schema request failed. Every variant is terminal for the request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Only GET method is allowed")]
    MethodNotAllowed,

    #[error("Failed to download values file: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("Failed to generate schema: {0}")]
    TransformFailed(#[from] TransformError),
}

impl PipelineError {
    /// Stable machine-readable tag written to the envelope's `error` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::FetchFailed(_) => "download_failed",
            Self::TransformFailed(_) => "transform_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::MethodNotAllowed,
            Self::FetchFailed(_) => StatusCode::BadRequest,
            Self::TransformFailed(_) => StatusCode::InternalServerError,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.tag().to_owned(),
            message: self.to_string(),
        }
    }

    /// Renders the error as a JSON response.
    pub fn into_response(self) -> Response {
        let response = Response::json(self.status(), &self.envelope());
        match self {
            Self::MethodNotAllowed => response.header("Allow", "GET"),
            _ => response,
        }
    }
}

/// JSON body of every error response: `{"error": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
}
