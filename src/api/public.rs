//! Public API types

use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::StatusCode;
use serde::{Deserialize, Serialize};

// Errors

/// JSON body returned for every request that fails before streaming
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorEnvelope {
    pub error: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

pub struct ApiError {
    error: anyhow::Error,
    expose_details: bool,
}

impl ApiError {
    /// Include the full error chain in the response body. Only for
    /// non-production deployments.
    pub fn with_details(mut self, expose_details: bool) -> Self {
        self.expose_details = expose_details;
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.error.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            details: self
                .expose_details
                .then(|| format!("{:?}", self.error)),
        }
    }
}

/// Convert `ApiError` into an Axum compatible response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Always log the error
        tracing::error!("{:#}", self.error);

        (StatusCode::INTERNAL_SERVER_ERROR, Json(self.envelope())).into_response()
    }
}

/// Enables using `?` on functions that return `Result<_,
/// anyhow::Error>` to turn them into `Result<_, ApiError>`
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self {
            error: err.into(),
            expose_details: false,
        }
    }
}

// Re-export public types from each route

pub mod chat {
    pub use crate::api::routes::chat::public::*;
}
