//! PetVerse client library.
//!
//! Everything a PetVerse front end triggers goes through this crate: a single
//! typed API client (public and token-attaching secure variants), the auth
//! session, the cart store that mirrors the server-side cart, and thin
//! clients for the catalog, appointments, forum, payments and users.
//!
//! # Architecture
//!
//! - The REST API is the source of truth. Local state is a cache that is
//!   replaced by server responses or refetched after each mutation.
//! - Every call returns a normalized [`error::ApiError`]; a 401/403 on the
//!   secure client expires the session once and broadcasts a login redirect.
//! - User-facing failures are surfaced through a [`notify::Notifier`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod analytics;
pub mod api;
pub mod appointments;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod forum;
pub mod notify;
pub mod payments;
pub mod state;
pub mod users;

pub use api::{Access, ApiClient};
pub use auth::{AuthEvent, AuthSession, SessionUser};
pub use cart::{CartError, CartStore};
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use notify::{Notifier, Toast, ToastLevel};
pub use state::{AppState, StateError};
