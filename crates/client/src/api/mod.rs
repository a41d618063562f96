//! The single typed HTTP layer every PetVerse call goes through.
//!
//! Two access levels share one connection pool:
//!
//! - [`Access::Public`] - plain JSON requests
//! - [`Access::Secure`] - adds `Authorization: Bearer <token>` from the
//!   session; a 401/403 response expires the session the token belonged to
//!   (see [`AuthSession::expire_generation`])
//!
//! Every response is normalized into `Result<T, ApiError>` here, so domain
//! clients never look at status codes themselves.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderValue, RETRY_AFTER};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use crate::auth::AuthSession;
use crate::config::ClientConfig;
use crate::error::{ApiError, error_message};

/// Header carrying a per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Empty query string for `get_json`.
pub const NO_QUERY: &[(&str, &str)] = &[];

/// Acknowledgement returned by create endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertResult {
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub inserted_id: Option<String>,
}

/// Decode the elements of a JSON array one by one, dropping those that do
/// not fit `T` instead of failing the whole list.
pub(crate) fn decode_each<T: DeserializeOwned>(items: Vec<serde_json::Value>, kind: &'static str) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(kind, index, error = %e, "Skipping malformed record");
                None
            }
        })
        .collect()
}

/// Which client variant a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Secure,
}

/// How a request was authenticated, captured when it was built.
#[derive(Debug, Clone, Copy)]
enum Sent {
    Public,
    Secure { generation: u64 },
}

/// Client for the PetVerse REST API.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base_url: Url,
    session: AuthSession,
}

impl ApiClient {
    /// Create a new API client bound to `session`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: AuthSession) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("petverse-client/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http: builder.build()?,
                base_url: config.api_url.clone(),
                session,
            }),
        })
    }

    /// The session whose token secure requests carry.
    #[must_use]
    pub fn session(&self) -> &AuthSession {
        &self.inner.session
    }

    /// Build the URL for a path below the API base.
    ///
    /// Segments are percent-encoded individually, so IDs and emails can be
    /// passed as-is.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL cannot take path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET` a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] on any failure.
    pub async fn get_json<T, Q>(
        &self,
        access: Access,
        segments: &[&str],
        query: &Q,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let (request, sent) = self.request(access, Method::GET, segments)?;
        self.send_json(sent, request.query(query)).await
    }

    /// `POST` a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] on any failure.
    pub async fn post_json<T, B>(
        &self,
        access: Access,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (request, sent) = self.request(access, Method::POST, segments)?;
        self.send_json(sent, request.json(body)).await
    }

    /// `POST` a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] on any failure.
    pub async fn post<B>(&self, access: Access, segments: &[&str], body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let (request, sent) = self.request(access, Method::POST, segments)?;
        self.send_empty(sent, request.json(body)).await
    }

    /// `PATCH` a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] on any failure.
    pub async fn patch_json<T, B>(
        &self,
        access: Access,
        segments: &[&str],
        body: &B,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (request, sent) = self.request(access, Method::PATCH, segments)?;
        self.send_json(sent, request.json(body)).await
    }

    /// `PATCH` a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] on any failure.
    pub async fn patch<B>(&self, access: Access, segments: &[&str], body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let (request, sent) = self.request(access, Method::PATCH, segments)?;
        self.send_empty(sent, request.json(body)).await
    }

    /// `DELETE` with query parameters, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns a normalized [`ApiError`] on any failure.
    pub async fn delete<Q>(&self, access: Access, segments: &[&str], query: &Q) -> Result<(), ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let (request, sent) = self.request(access, Method::DELETE, segments)?;
        self.send_empty(sent, request.query(query)).await
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    fn request(
        &self,
        access: Access,
        method: Method,
        segments: &[&str],
    ) -> Result<(RequestBuilder, Sent), ApiError> {
        let url = self.endpoint(segments)?;
        // Read before the token, so a sign-in in between cannot pair an old
        // token with the new generation.
        let sent = match access {
            Access::Public => Sent::Public,
            Access::Secure => Sent::Secure {
                generation: self.inner.session.generation(),
            },
        };
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut request = self
            .inner
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id);

        if access == Access::Secure
            && let Some(token) = self.inner.session.token()
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| ApiError::InvalidUrl(format!("invalid token header: {e}")))?;
            value.set_sensitive(true);
            request = request.header(AUTHORIZATION, value);
        }

        Ok((request, sent))
    }

    #[instrument(skip(self, request))]
    async fn send_json<T: DeserializeOwned>(
        &self,
        sent: Sent,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.dispatch(sent, request).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse PetVerse API response"
            );
            ApiError::Decode(e)
        })
    }

    #[instrument(skip(self, request))]
    async fn send_empty(&self, sent: Sent, request: RequestBuilder) -> Result<(), ApiError> {
        self.dispatch(sent, request).await.map(drop)
    }

    /// Send a request and turn any non-success status into an [`ApiError`].
    async fn dispatch(&self, sent: Sent, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let path = response.url().path().to_string();

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            if let Sent::Secure { generation } = sent {
                self.inner.session.expire_generation(generation);
            }
            return Err(ApiError::Unauthorized(status));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            path = %path,
            body = %body.chars().take(500).collect::<String>(),
            "PetVerse API returned non-success status"
        );
        Err(ApiError::Status {
            status,
            message: error_message(&body),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig::new(Url::parse(base).unwrap());
        ApiClient::new(&config, AuthSession::in_memory()).unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let api = client("http://localhost:5000");
        assert_eq!(
            api.endpoint(&["carts", "increase"]).unwrap().as_str(),
            "http://localhost:5000/carts/increase"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("https://api.petverse.io/v1/");
        assert_eq!(
            api.endpoint(&["product", "abc123"]).unwrap().as_str(),
            "https://api.petverse.io/v1/product/abc123"
        );
    }

    #[test]
    fn test_decode_each_skips_malformed() {
        #[derive(Deserialize)]
        struct Row {
            n: u8,
        }

        let items = vec![
            serde_json::json!({"n": 1}),
            serde_json::json!({"n": 300}),
            serde_json::json!({"m": 2}),
            serde_json::json!({"n": 3}),
        ];
        let rows: Vec<Row> = decode_each(items, "row");
        assert_eq!(rows.iter().map(|r| r.n).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let api = client("http://localhost:5000");
        assert_eq!(
            api.endpoint(&["threads", "a/b c"]).unwrap().as_str(),
            "http://localhost:5000/threads/a%2Fb%20c"
        );
    }
}
