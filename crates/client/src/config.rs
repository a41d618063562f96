//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PETVERSE_API_URL` - Base URL of the PetVerse REST API
//!
//! ## Optional
//! - `PETVERSE_LOGIN_PATH` - Path front ends redirect to on auth expiry (default: /login)
//! - `PETVERSE_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: none)
//! - `PETVERSE_PRODUCT_CACHE_TTL_SECS` - Product cache lifetime (default: 300)
//! - `PETVERSE_TOKEN_FILE` - Persist the session token in this JSON file
//! - `PETVERSE_AUTH_TOKEN` - Pre-issued bearer token
//! - `PETVERSE_USER_EMAIL` - Identity to restore the session for

use std::path::PathBuf;
use std::time::Duration;

use petverse_core::Email;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_LOGIN_PATH: &str = "/login";
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// PetVerse client configuration.
///
/// Implements `Debug` manually to redact the auth token.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API
    pub api_url: Url,
    /// Where front ends send the user after a forced logout
    pub login_path: String,
    /// Optional per-request timeout
    pub request_timeout: Option<Duration>,
    /// Lifetime of cached product listings
    pub product_cache_ttl: Duration,
    /// File used as the token store (in-memory when unset)
    pub token_file: Option<PathBuf>,
    /// Bearer token supplied out of band
    pub auth_token: Option<SecretString>,
    /// Identity whose session is restored on startup
    pub user_email: Option<Email>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url.as_str())
            .field("login_path", &self.login_path)
            .field("request_timeout", &self.request_timeout)
            .field("product_cache_ttl", &self.product_cache_ttl)
            .field("token_file", &self.token_file)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_email", &self.user_email)
            .finish()
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            request_timeout: None,
            product_cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
            token_file: None,
            auth_token: None,
            user_email: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = parse_api_url(&get_required(&lookup, "PETVERSE_API_URL")?)?;

        let login_path = lookup("PETVERSE_LOGIN_PATH")
            .unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        if !login_path.starts_with('/') {
            return Err(ConfigError::InvalidEnvVar(
                "PETVERSE_LOGIN_PATH".to_string(),
                "must start with '/'".to_string(),
            ));
        }

        let request_timeout = get_optional_secs(&lookup, "PETVERSE_REQUEST_TIMEOUT_SECS")?;
        let product_cache_ttl = get_optional_secs(&lookup, "PETVERSE_PRODUCT_CACHE_TTL_SECS")?
            .unwrap_or(Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS));

        let token_file = lookup("PETVERSE_TOKEN_FILE").map(PathBuf::from);

        // Issued by the API, so only blankness is checked.
        let auth_token = match lookup("PETVERSE_AUTH_TOKEN") {
            Some(token) if token.trim().is_empty() => {
                return Err(ConfigError::InvalidEnvVar(
                    "PETVERSE_AUTH_TOKEN".to_string(),
                    "must not be blank".to_string(),
                ));
            }
            Some(token) => Some(SecretString::from(token.trim().to_string())),
            None => None,
        };

        let user_email = lookup("PETVERSE_USER_EMAIL")
            .map(|raw| {
                Email::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("PETVERSE_USER_EMAIL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            api_url,
            login_path,
            request_timeout,
            product_cache_ttl,
            token_file,
            auth_token,
            user_email,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required variable.
fn get_required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional whole-second duration.
fn get_optional_secs<F>(lookup: &F, key: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

/// Parse the API base URL, accepting only absolute http(s) URLs.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("PETVERSE_API_URL".to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            "PETVERSE_API_URL".to_string(),
            format!("expected an http(s) URL, got {raw}"),
        ));
    }

    Ok(url)
}
