//! Authentication session.
//!
//! Identity itself comes from a third-party sign-in SDK. Once the front end
//! knows who the user is, it exchanges the email for an API token
//! ([`AuthClient::issue_token`]) and opens an [`AuthSession`]. The session
//! owns the token, publishes the current user and broadcasts [`AuthEvent`]s.
//!
//! # Expiry
//!
//! Each secure request remembers the session generation it was built in and
//! reports a 401/403 through [`AuthSession::expire_generation`]. Only the
//! first report for the current generation logs the user out and emits
//! [`AuthEvent::LoginRequired`]. Later reports, and late ones for a token
//! that a newer sign-in already replaced, are ignored.

mod token_store;

pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use petverse_core::{Email, UserRole};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::instrument;

use crate::api::{Access, ApiClient};
use crate::error::ApiError;
use crate::users::User;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// The signed-in user as far as the client is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub email: Email,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub role: UserRole,
}

impl SessionUser {
    /// A plain user known only by email.
    #[must_use]
    pub const fn new(email: Email) -> Self {
        Self {
            email,
            name: None,
            photo: None,
            role: UserRole::User,
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Name to show on posts and comments.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| self.email.local_part())
    }
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: Some(user.name.clone()),
            photo: user.photo.clone(),
            role: user.role,
        }
    }
}

/// Session lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Email),
    LoggedOut,
    /// The token was rejected; the front end should navigate to `redirect`.
    LoginRequired { redirect: String },
}

/// Shared authentication state.
///
/// Cheap to clone; all clones observe the same session.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    user: watch::Sender<Option<SessionUser>>,
    events: broadcast::Sender<AuthEvent>,
    tokens: Arc<dyn TokenStore>,
    login_path: String,
    /// Even while live, odd once expired. Every sign-in moves it to the next
    /// even value.
    generation: AtomicU64,
}

impl AuthSession {
    /// Create a signed-out session backed by `tokens`.
    #[must_use]
    pub fn new(tokens: Arc<dyn TokenStore>, login_path: impl Into<String>) -> Self {
        let (user, _) = watch::channel(None);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(SessionInner {
                user,
                events,
                tokens,
                login_path: login_path.into(),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// A session with an in-memory token store and the default login path.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryTokenStore::new()), "/login")
    }

    /// Start a session for `user` with an API token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted.
    #[instrument(skip(self, user, token), fields(email = %user.email))]
    pub fn sign_in(&self, user: SessionUser, token: &SecretString) -> Result<(), TokenStoreError> {
        self.inner.tokens.save(token)?;
        self.next_generation();

        let email = user.email.clone();
        self.inner.user.send_replace(Some(user));
        let _ = self.inner.events.send(AuthEvent::SignedIn(email));
        tracing::info!("Signed in");
        Ok(())
    }

    /// Resume a session for `user` with whatever token is already stored.
    ///
    /// Returns `false` (and stays signed out) when no token is stored.
    pub fn restore(&self, user: SessionUser) -> bool {
        if self.token().is_none() {
            return false;
        }
        self.next_generation();
        let email = user.email.clone();
        self.inner.user.send_replace(Some(user));
        let _ = self.inner.events.send(AuthEvent::SignedIn(email));
        true
    }

    /// Clear the token and the current user.
    pub fn logout(&self) {
        if let Err(e) = self.inner.tokens.clear() {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }
        let was_signed_in = self.inner.user.send_replace(None).is_some();
        if was_signed_in {
            tracing::info!("Logged out");
        }
        let _ = self.inner.events.send(AuthEvent::LoggedOut);
    }

    /// Force a logout after the API rejected the current token.
    ///
    /// Returns `true` if this call performed the logout and broadcast the
    /// redirect; `false` if the session had already been expired.
    pub fn expire(&self) -> bool {
        self.expire_generation(self.generation())
    }

    /// The generation a request built now belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Force a logout for a rejection of a request built in `generation`.
    ///
    /// Does nothing if that generation already expired or a later sign-in
    /// replaced it.
    pub fn expire_generation(&self, generation: u64) -> bool {
        if generation % 2 == 1
            || self
                .inner
                .generation
                .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            tracing::debug!(generation, "Ignoring auth failure for an expired or replaced session");
            return false;
        }
        tracing::warn!("API rejected session token, logging out");
        self.logout();
        let _ = self.inner.events.send(AuthEvent::LoginRequired {
            redirect: self.inner.login_path.clone(),
        });
        true
    }

    fn next_generation(&self) {
        // fetch_update only fails when the closure returns None.
        let _ = self
            .inner
            .generation
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |g| Some((g | 1) + 1));
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<SessionUser> {
        self.inner.user.borrow().clone()
    }

    /// Email of the signed-in user, if any.
    #[must_use]
    pub fn current_email(&self) -> Option<Email> {
        self.inner.user.borrow().as_ref().map(|user| user.email.clone())
    }

    /// Current bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        match self.inner.tokens.load() {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored token");
                None
            }
        }
    }

    /// Watch the current user.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionUser>> {
        self.inner.user.subscribe()
    }

    /// Receive session events emitted from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Path front ends redirect to after [`AuthSession::expire`].
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.inner.login_path
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    email: &'a Email,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Exchanges an identity for an API token and opens the session.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Ask the API for a bearer token for `email` (`POST /jwt`).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn issue_token(&self, email: &Email) -> Result<SecretString, ApiError> {
        let response: TokenResponse = self
            .api
            .post_json(Access::Public, &["jwt"], &TokenRequest { email })
            .await?;
        Ok(SecretString::from(response.token))
    }

    /// Issue a token for `user` and sign the session in.
    ///
    /// # Errors
    ///
    /// Returns an error if the token request fails or the token cannot be
    /// stored.
    pub async fn sign_in(&self, user: SessionUser) -> Result<(), SignInError> {
        let token = self.issue_token(&user.email).await?;
        self.api.session().sign_in(user, &token)?;
        Ok(())
    }

    /// End the session.
    pub fn logout(&self) {
        self.api.session().logout();
    }
}

/// Errors from [`AuthClient::sign_in`].
#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    TokenStore(#[from] TokenStoreError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn user(email: &str) -> SessionUser {
        SessionUser::new(Email::parse(email).unwrap())
    }

    #[test]
    fn test_sign_in_and_logout() {
        let session = AuthSession::in_memory();
        let mut events = session.events();

        session
            .sign_in(user("a@petverse.io"), &SecretString::from("t1"))
            .unwrap();
        assert_eq!(session.current_email().unwrap().as_str(), "a@petverse.io");
        assert_eq!(session.token().unwrap().expose_secret(), "t1");

        session.logout();
        assert!(session.current_user().is_none());
        assert!(session.token().is_none());

        assert!(matches!(events.try_recv().unwrap(), AuthEvent::SignedIn(_)));
        assert_eq!(events.try_recv().unwrap(), AuthEvent::LoggedOut);
    }

    #[test]
    fn test_expire_fires_once_per_sign_in() {
        let session = AuthSession::in_memory();
        session
            .sign_in(user("a@petverse.io"), &SecretString::from("t1"))
            .unwrap();
        let mut events = session.events();

        assert!(session.expire());
        assert!(!session.expire());
        assert!(session.current_user().is_none());

        assert_eq!(events.try_recv().unwrap(), AuthEvent::LoggedOut);
        assert_eq!(
            events.try_recv().unwrap(),
            AuthEvent::LoginRequired {
                redirect: "/login".to_string()
            }
        );
        assert!(events.try_recv().is_err());

        // A fresh sign-in re-arms the interceptor.
        session
            .sign_in(user("a@petverse.io"), &SecretString::from("t2"))
            .unwrap();
        assert!(session.expire());
    }

    #[test]
    fn test_late_rejection_of_replaced_token_is_ignored() {
        let session = AuthSession::in_memory();
        session
            .sign_in(user("a@petverse.io"), &SecretString::from("t1"))
            .unwrap();
        let old = session.generation();

        session
            .sign_in(user("a@petverse.io"), &SecretString::from("t2"))
            .unwrap();
        let mut events = session.events();

        // A request sent with t1 comes back 401 after the re-sign-in.
        assert!(!session.expire_generation(old));
        assert_eq!(session.current_email().unwrap().as_str(), "a@petverse.io");
        assert_eq!(session.token().unwrap().expose_secret(), "t2");
        assert!(events.try_recv().is_err());

        assert!(session.expire_generation(session.generation()));
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_restore_requires_stored_token() {
        let session = AuthSession::in_memory();
        assert!(!session.restore(user("a@petverse.io")));
        assert!(session.current_user().is_none());

        session
            .sign_in(user("a@petverse.io"), &SecretString::from("t1"))
            .unwrap();
        session.logout();
        assert!(!session.restore(user("a@petverse.io")));
    }

    #[test]
    fn test_watch_sees_user_changes() {
        let session = AuthSession::in_memory();
        let rx = session.subscribe();
        session
            .sign_in(user("b@petverse.io"), &SecretString::from("t"))
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow().as_ref().map(SessionUser::display_name),
            Some("b")
        );
    }
}
