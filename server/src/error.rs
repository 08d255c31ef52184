//! API error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use tomato_leaf::TomatoError;

/// Errors returned by the routes
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request itself is unusable
    #[error("{0}")]
    BadRequest(String),

    /// No model artifact was loaded at startup
    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Anything else; the detail is logged, never returned
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of an error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::ModelNotLoaded => "model_not_loaded",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<TomatoError> for ApiError {
    fn from(err: TomatoError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = match &self {
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                "Prediction failed due to an internal error".to_string()
            }
            ApiError::ModelNotLoaded => {
                "Model not loaded. Train a model and restart the server.".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: self.kind(),
            detail,
        };
        (self.status(), Json(body)).into_response()
    }
}
