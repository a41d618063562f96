//! Payments, orders and the checkout flow.
//!
//! Card entry and confirmation belong to the payment gateway. This module
//! only creates the intent the gateway confirms against and records the
//! confirmed payment afterwards.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use petverse_core::{Cart, CartItem, Email, PaymentId, PaymentStatus, round_money};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::api::{Access, ApiClient, InsertResult, NO_QUERY};
use crate::cart::{CartError, CartStore};
use crate::error::ApiError;
use crate::notify::{Notifier, Toast};

/// A recorded payment, as listed by `/orders` and `/payments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: PaymentId,
    pub email: Email,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub cart_items: Vec<CartItem>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub status: PaymentStatus,
}

/// Payload for `POST /make-payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub email: Email,
    pub transaction_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub cart_items: Vec<CartItem>,
    pub date: DateTime<Utc>,
    pub status: PaymentStatus,
}

/// A payment intent created for the gateway.
pub struct PaymentIntent {
    pub amount: Decimal,
    /// Handed to the gateway to confirm the card payment.
    pub client_secret: SecretString,
}

impl std::fmt::Debug for PaymentIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentIntent")
            .field("amount", &self.amount)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Serialize)]
struct IntentRequest {
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntentResponse {
    client_secret: String,
}

#[derive(Serialize)]
struct EmailQuery<'a> {
    email: &'a Email,
}

/// Errors from payments and checkout.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("please log in to check out")]
    NotSignedIn,

    #[error("your cart is empty")]
    EmptyCart,

    #[error("invalid payment amount: {0}")]
    InvalidAmount(Decimal),

    #[error("missing transaction id")]
    MissingTransactionId,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Client for payment and order endpoints.
#[derive(Clone)]
pub struct PaymentClient {
    api: ApiClient,
}

impl PaymentClient {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Create a payment intent for `amount` dollars (`POST /create-payment-intent`).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::InvalidAmount`] for non-positive amounts, or
    /// the API error.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_payment_intent(&self, amount: Decimal) -> Result<PaymentIntent, PaymentError> {
        let amount = round_money(amount);
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(amount));
        }

        let response: IntentResponse = self
            .api
            .post_json(Access::Secure, &["create-payment-intent"], &IntentRequest { price: amount })
            .await?;
        Ok(PaymentIntent {
            amount,
            client_secret: SecretString::from(response.client_secret),
        })
    }

    /// Record a confirmed payment (`POST /make-payment`).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::MissingTransactionId`] for a blank ID, or the
    /// API error.
    #[instrument(skip(self, record), fields(email = %record.email, transaction_id = %record.transaction_id))]
    pub async fn make_payment(&self, record: &PaymentRecord) -> Result<InsertResult, PaymentError> {
        if record.transaction_id.trim().is_empty() {
            return Err(PaymentError::MissingTransactionId);
        }
        Ok(self
            .api
            .post_json(Access::Secure, &["make-payment"], record)
            .await?)
    }

    /// Every order (admin, `GET /orders`).
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<Payment>, ApiError> {
        self.api.get_json(Access::Secure, &["orders"], NO_QUERY).await
    }

    /// Payment history of `email` (`GET /payments?email=`).
    ///
    /// # Errors
    ///
    /// Returns the API error.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn my_payments(&self, email: &Email) -> Result<Vec<Payment>, ApiError> {
        self.api
            .get_json(Access::Secure, &["payments"], &EmailQuery { email })
            .await
    }
}

/// A checkout waiting for the gateway to confirm the payment.
#[derive(Debug)]
pub struct PendingCheckout {
    pub email: Email,
    pub cart: Cart,
    pub intent: PaymentIntent,
}

/// Cart-to-payment flow.
#[derive(Clone)]
pub struct Checkout {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    payments: PaymentClient,
    cart: CartStore,
    notifier: Arc<dyn Notifier>,
}

impl Checkout {
    #[must_use]
    pub fn new(payments: PaymentClient, cart: CartStore, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            inner: Arc::new(CheckoutInner {
                payments,
                cart,
                notifier,
            }),
        }
    }

    /// Reload the cart and create an intent for its total.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotSignedIn`], [`PaymentError::EmptyCart`],
    /// or the error of the cart reload or intent request.
    #[instrument(skip(self))]
    pub async fn begin(&self) -> Result<PendingCheckout, PaymentError> {
        let cart = self.inner.cart.fetch_cart().await?;
        let Some(email) = cart.owner_email.clone() else {
            return Err(self.reject(PaymentError::NotSignedIn));
        };
        if cart.is_empty() {
            return Err(self.reject(PaymentError::EmptyCart));
        }

        match self.inner.payments.create_payment_intent(cart.total_price).await {
            Ok(intent) => Ok(PendingCheckout { email, cart, intent }),
            Err(e) => Err(self.reject(e)),
        }
    }

    /// Record the payment the gateway confirmed as `transaction_id`, then
    /// clear the cart.
    ///
    /// A failure to clear the cart does not undo the payment; it is reported
    /// by the cart store and logged here.
    ///
    /// # Errors
    ///
    /// Returns the error of recording the payment.
    #[instrument(skip(self, pending), fields(email = %pending.email))]
    pub async fn complete(
        &self,
        pending: PendingCheckout,
        transaction_id: &str,
    ) -> Result<PaymentRecord, PaymentError> {
        let record = PaymentRecord {
            email: pending.email,
            transaction_id: transaction_id.trim().to_string(),
            amount: pending.intent.amount,
            cart_items: pending.cart.cart_items,
            date: Utc::now(),
            status: PaymentStatus::Paid,
        };

        if let Err(e) = self.inner.payments.make_payment(&record).await {
            return Err(self.reject(e));
        }
        self.inner
            .notifier
            .notify(Toast::success(format!("Payment of ${} received", record.amount)));

        if let Err(e) = self.inner.cart.clear_cart().await {
            tracing::warn!(error = %e, "Payment recorded but cart could not be cleared");
        }
        Ok(record)
    }

    fn reject(&self, err: PaymentError) -> PaymentError {
        tracing::error!(error = %err, "Checkout failed");
        self.inner.notifier.notify(Toast::error(err.to_string()));
        err
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_payment() {
        let json = r#"{
            "_id": "p1",
            "email": "kim@example.com",
            "transactionId": "pi_123",
            "amount": 42.5,
            "date": "2026-10-01T12:00:00Z",
            "status": "shipped"
        }"#;
        let payment: Payment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.amount, Decimal::new(425, 1));
        assert_eq!(payment.status, PaymentStatus::Shipped);
        assert!(payment.cart_items.is_empty());
    }

    #[test]
    fn test_intent_debug_redacts_secret() {
        let intent = PaymentIntent {
            amount: Decimal::ONE,
            client_secret: SecretString::from("pi_secret_abc"),
        };
        let debug = format!("{intent:?}");
        assert!(!debug.contains("pi_secret_abc"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_intent_request_sends_dollars() {
        let value = serde_json::to_value(IntentRequest {
            price: Decimal::new(1999, 2),
        })
        .unwrap();
        assert_eq!(value, serde_json::json!({"price": 19.99}));
    }
}
