//! Core types for PetVerse.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use cart::{Cart, CartItem, ShippingInfo};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Discount, DiscountError, discounted_price, round_money};
pub use status::*;
