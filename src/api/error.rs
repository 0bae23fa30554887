//! HTTP error mapping
//!
//! Core errors become JSON bodies `{error, details?}`:
//! `NotFound` is 404, `Validation` is 400, everything else is 500.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tally_core::Error;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Error returned by API handlers
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self(Error::NotFound(what.into()))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self(Error::Validation(msg.into()))
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_systemic() {
            error!(error = %self.0, "Request failed");
        } else {
            debug!(error = %self.0, "Request rejected");
        }

        let (status, error, details) = match self.0 {
            Error::NotFound(what) => (StatusCode::NOT_FOUND, "Not found", what),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "Validation error", msg),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                other.to_string(),
            ),
        };

        (
            status,
            Json(ErrorBody {
                error: error.to_string(),
                details: Some(details),
            }),
        )
            .into_response()
    }
}

/// Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
