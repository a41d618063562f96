//! Error types for the cart store.

use thiserror::Error;

use crate::error::ApiError;

/// Errors returned by [`super::CartStore`] operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// No user is signed in; nothing was sent to the API.
    #[error("please log in to manage your cart")]
    NotSignedIn,

    /// A quantity or quantity change that can never be valid.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// Whether the failure means the user must sign in (again).
    #[must_use]
    pub const fn needs_login(&self) -> bool {
        matches!(self, Self::NotSignedIn | Self::Api(ApiError::Unauthorized(_)))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_needs_login() {
        assert!(CartError::NotSignedIn.needs_login());
        assert!(CartError::Api(ApiError::Unauthorized(StatusCode::UNAUTHORIZED)).needs_login());
        assert!(!CartError::InvalidQuantity(0).needs_login());
        assert!(!CartError::Api(ApiError::RateLimited(5)).needs_login());
    }
}
