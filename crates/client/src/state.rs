//! Application state shared by a front end.

use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiClient;
use crate::appointments::AppointmentClient;
use crate::auth::{AuthClient, AuthSession, FileTokenStore, MemoryTokenStore, SessionUser, TokenStore, TokenStoreError};
use crate::cart::CartStore;
use crate::catalog::CatalogClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::forum::ForumClient;
use crate::notify::{Notifier, TracingNotifier};
use crate::payments::{Checkout, PaymentClient};
use crate::users::UserClient;

/// Error building [`AppState`].
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to build API client: {0}")]
    Api(#[from] ApiError),
    #[error("failed to store auth token: {0}")]
    TokenStore(#[from] TokenStoreError),
}

/// Every client of the app, wired to one session and one notifier.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ClientConfig,
    session: AuthSession,
    notifier: Arc<dyn Notifier>,
    api: ApiClient,
    auth: AuthClient,
    cart: CartStore,
    catalog: CatalogClient,
    appointments: AppointmentClient,
    forum: ForumClient,
    payments: PaymentClient,
    checkout: Checkout,
    users: UserClient,
}

impl AppState {
    /// Build the state with toasts logged through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`AppState::with_notifier`].
    pub fn new(config: ClientConfig) -> Result<Self, StateError> {
        Self::with_notifier(config, Arc::new(TracingNotifier))
    }

    /// Build the state around `notifier`.
    ///
    /// The token store is the configured token file, or memory. A configured
    /// auth token is stored first; the session is then restored for the
    /// configured user email when a token is available.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the configured
    /// token cannot be stored.
    pub fn with_notifier(config: ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self, StateError> {
        let tokens: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path.clone())),
            None => Arc::new(MemoryTokenStore::new()),
        };
        if let Some(token) = &config.auth_token {
            tokens.save(token)?;
        }

        let session = AuthSession::new(tokens, config.login_path.clone());
        if let Some(email) = &config.user_email
            && !session.restore(SessionUser::new(email.clone()))
        {
            tracing::info!(%email, "No stored token, starting signed out");
        }

        let api = ApiClient::new(&config, session.clone())?;
        let cart = CartStore::new(api.clone(), Arc::clone(&notifier));
        let payments = PaymentClient::new(api.clone());
        let checkout = Checkout::new(payments.clone(), cart.clone(), Arc::clone(&notifier));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                auth: AuthClient::new(api.clone()),
                catalog: CatalogClient::new(api.clone(), config.product_cache_ttl),
                appointments: AppointmentClient::new(api.clone(), Arc::clone(&notifier)),
                forum: ForumClient::new(api.clone(), Arc::clone(&notifier)),
                users: UserClient::new(api.clone()),
                config,
                session,
                notifier,
                api,
                cart,
                payments,
                checkout,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &AuthSession {
        &self.inner.session
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    #[must_use]
    pub fn appointments(&self) -> &AppointmentClient {
        &self.inner.appointments
    }

    #[must_use]
    pub fn forum(&self) -> &ForumClient {
        &self.inner.forum
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentClient {
        &self.inner.payments
    }

    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    #[must_use]
    pub fn users(&self) -> &UserClient {
        &self.inner.users
    }
}
