//! Cart model shared between the API wire format and the local cart store.
//!
//! One cart exists per user, keyed by the owner's email. The server is the
//! source of truth: line `price` values are fixed when an item is added and
//! totals come back with every mutation. The helpers here only read the
//! snapshot; they never re-price lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::ProductId;
use super::price::{Discount, discounted_price};

/// Delivery details attached to a cart at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// A single product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    /// Size/flavour/colour selection, when the product has variants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub product_name: String,
    #[serde(default)]
    pub product_image: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Discount,
    /// Discounted line total as priced by the server.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Build a one-unit line for a product, applying its discount.
    #[must_use]
    pub fn single(
        product_id: ProductId,
        product_name: impl Into<String>,
        product_image: impl Into<String>,
        unit_price: Decimal,
        discount: Discount,
    ) -> Self {
        Self {
            product_id,
            variant: None,
            product_name: product_name.into(),
            product_image: product_image.into(),
            quantity: 1,
            unit_price,
            discount,
            price: discounted_price(unit_price, discount),
            added_at: Utc::now(),
        }
    }

    /// Attach a variant selection.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Whether this line is the given product/variant pair.
    #[must_use]
    pub fn matches(&self, product_id: &ProductId, variant: Option<&str>) -> bool {
        &self.product_id == product_id && self.variant.as_deref() == variant
    }
}

/// A user's cart as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<Email>,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
    #[serde(default)]
    pub total_items: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_info: Option<ShippingInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// An empty cart, optionally owned by `owner`.
    #[must_use]
    pub const fn empty(owner: Option<Email>) -> Self {
        Self {
            owner_email: owner,
            cart_items: Vec::new(),
            total_price: Decimal::ZERO,
            total_items: 0,
            shipping_info: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cart_items.is_empty()
    }

    /// Find a line by product and variant (linear scan).
    #[must_use]
    pub fn get_item(&self, product_id: &ProductId, variant: Option<&str>) -> Option<&CartItem> {
        self.cart_items
            .iter()
            .find(|item| item.matches(product_id, variant))
    }

    /// Sum of line quantities.
    #[must_use]
    pub fn computed_total_items(&self) -> u32 {
        self.cart_items.iter().map(|item| item.quantity).sum()
    }

    /// Sum of line prices.
    #[must_use]
    pub fn computed_total_price(&self) -> Decimal {
        self.cart_items.iter().map(|item| item.price).sum()
    }

    /// Whether the server-reported totals agree with the lines.
    #[must_use]
    pub fn totals_match(&self) -> bool {
        self.total_items == self.computed_total_items()
            && self.total_price == self.computed_total_price()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Self::empty(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(id: &str, variant: Option<&str>, qty: u32, price: &str) -> CartItem {
        let mut item = CartItem::single(
            ProductId::new(id),
            format!("Product {id}"),
            "",
            dec(price),
            Discount::NONE,
        );
        item.variant = variant.map(str::to_owned);
        item.quantity = qty;
        item
    }

    #[test]
    fn test_single_item_applies_discount() {
        let line = CartItem::single(
            ProductId::new("kibble"),
            "Salmon Kibble",
            "https://img/kibble.png",
            dec("24.99"),
            Discount::new(dec("20")).unwrap(),
        );
        assert_eq!(line.quantity, 1);
        assert_eq!(line.price, dec("19.99"));
    }

    #[test]
    fn test_get_item_matches_product_and_variant() {
        let mut cart = Cart::empty(None);
        cart.cart_items = vec![
            item("collar", Some("S"), 1, "9.00"),
            item("collar", Some("L"), 2, "11.00"),
            item("bowl", None, 1, "5.00"),
        ];

        let large = cart.get_item(&ProductId::new("collar"), Some("L")).unwrap();
        assert_eq!(large.quantity, 2);
        assert!(cart.get_item(&ProductId::new("bowl"), None).is_some());
        assert!(cart.get_item(&ProductId::new("collar"), None).is_none());
        assert!(cart.get_item(&ProductId::new("leash"), None).is_none());
    }

    #[test]
    fn test_totals_match() {
        let mut cart = Cart::empty(None);
        cart.cart_items = vec![item("a", None, 2, "3.50"), item("b", None, 1, "1.25")];
        cart.total_items = 3;
        cart.total_price = dec("4.75");
        assert!(cart.totals_match());

        cart.total_items = 2;
        assert!(!cart.totals_match());
    }

    #[test]
    fn test_deserialize_server_cart() {
        let json = r#"{
            "ownerEmail": "owner@petverse.io",
            "cartItems": [{
                "productId": "p1",
                "productName": "Catnip Mouse",
                "productImage": "https://img/mouse.png",
                "quantity": 2,
                "unitPrice": 4.5,
                "discount": 10,
                "price": 4.05,
                "addedAt": "2026-03-01T10:00:00Z"
            }],
            "totalPrice": 4.05,
            "totalItems": 2,
            "shippingInfo": { "city": "Dhaka" },
            "createdAt": "2026-03-01T10:00:00Z",
            "updatedAt": "2026-03-01T10:05:00Z"
        }"#;

        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(cart.owner_email.unwrap().as_str(), "owner@petverse.io");
        let line = cart.cart_items.first().unwrap();
        assert_eq!(line.unit_price, dec("4.5"));
        assert_eq!(line.discount.percent(), dec("10"));
        assert_eq!(line.variant, None);
        assert_eq!(
            cart.shipping_info.unwrap().city.as_deref(),
            Some("Dhaka")
        );
    }

    #[test]
    fn test_deserialize_sparse_cart() {
        let cart: Cart = serde_json::from_str(r#"{"ownerEmail":"a@b.c"}"#).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price, Decimal::ZERO);
    }
}
