//! Normalized error type for every PetVerse API call.
//!
//! Whatever endpoint is hit, callers see one of these variants. Auth expiry
//! is already handled by the time [`ApiError::Unauthorized`] is returned.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the PetVerse REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server rejected the credentials (401) or the action (403).
    #[error("Unauthorized ({0})")]
    Unauthorized(StatusCode),

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("API error ({status}): {message}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Server-provided message, truncated.
        message: String,
    },

    /// The response body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),

    /// An endpoint URL could not be built from the configured base.
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Whether this error came from an auth rejection.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// HTTP status associated with the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized(status) | Self::Status { status, .. } => Some(*status),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Http(err) => err.status(),
            Self::Decode(_) | Self::InvalidUrl(_) => None,
        }
    }
}

/// Error body shape used by the API (`{ "message": "..." }`).
#[derive(Debug, serde::Deserialize)]
pub(crate) struct ErrorBody {
    pub message: String,
}

/// Pull a readable message out of an error response body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |parsed| parsed.message,
    )
}
