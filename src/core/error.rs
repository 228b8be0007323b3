//! Errors that end a chat request.
//!
//! Malformed SSE lines and undecodable bytes are not represented here
//! because they never leave the stream transformer: the offending line
//! or byte is skipped and the stream continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// A required secret is missing from the environment
    #[error("Missing required configuration: {0}")]
    Configuration(String),

    /// The inbound request body or one of its messages is malformed
    #[error("Invalid request: {0}")]
    Validation(String),

    /// A provider could not be reached or kept failing after retries
    #[error("Request to {service} failed: {reason}")]
    UpstreamConnection {
        service: &'static str,
        reason: String,
    },

    /// The upstream body failed mid-stream
    #[error("Reading upstream stream failed: {0}")]
    StreamRead(String),
}
