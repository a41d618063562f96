//! PetVerse Core - Shared types library.
//!
//! This crate provides common types used across all PetVerse components:
//! - `client` - Typed REST client, auth session and cart store
//! - `cli` - Command-line front end over the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices and discounts, the cart model
//!   and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
