//! Cart store: the local mirror of a user's server-side cart.
//!
//! The API owns the cart. This store keeps the last snapshot it saw and
//! refreshes it after every mutation, either from the mutation's response
//! (`add_to_cart`, `update_cart`) or by refetching (`update_quantity`,
//! `decrement`, `remove_from_cart`, `clear_cart`).
//!
//! # Consistency
//!
//! - Mutations are serialized per store, so a mutation's refetch always
//!   observes that mutation. Other processes still race last-write-wins on
//!   the server.
//! - The snapshot belongs to one user. When the session's user changes the
//!   snapshot is discarded before anything reads or writes it.
//! - Every failure is reported once through the [`Notifier`] and returned to
//!   the caller.

mod error;

pub use error::CartError;

use std::sync::Arc;

use petverse_core::{Cart, CartItem, Email, ProductId};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::api::{Access, ApiClient};
use crate::catalog::Product;
use crate::error::ApiError;
use crate::notify::{Notifier, Toast};

/// A change to one line's quantity, sent to `PATCH /carts/increase`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityChange {
    pub product_id: ProductId,
    pub variant: Option<String>,
    /// Signed change; `-1` decreases by one.
    pub delta: i32,
}

impl QuantityChange {
    #[must_use]
    pub const fn increase(product_id: ProductId, variant: Option<String>) -> Self {
        Self {
            product_id,
            variant,
            delta: 1,
        }
    }

    #[must_use]
    pub const fn decrease(product_id: ProductId, variant: Option<String>) -> Self {
        Self {
            product_id,
            variant,
            delta: -1,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemsRequest<'a> {
    owner_email: &'a Email,
    cart_items: [&'a CartItem; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateItemRequest<'a> {
    owner_email: &'a Email,
    cart_item: &'a CartItem,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuantityRequest<'a> {
    owner_email: &'a Email,
    product_id: &'a ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
    quantity: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemQuery<'a> {
    email: &'a Email,
    product_id: &'a ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    variant: Option<&'a str>,
}

#[derive(Serialize)]
struct OwnerQuery<'a> {
    email: &'a Email,
}

/// Local cache of the signed-in user's cart.
///
/// Cheap to clone; clones share the snapshot.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    notifier: Arc<dyn Notifier>,
    cart: RwLock<Cart>,
    mutation: Mutex<()>,
}

impl CartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(api: ApiClient, notifier: Arc<dyn Notifier>) -> Self {
        let owner = api.session().current_email();
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                notifier,
                cart: RwLock::new(Cart::empty(owner)),
                mutation: Mutex::new(()),
            }),
        }
    }

    // =========================================================================
    // Reads (local only)
    // =========================================================================

    /// The current snapshot, discarded first if the user changed.
    pub async fn snapshot(&self) -> Cart {
        let owner = self.inner.api.session().current_email();
        self.discard_if_foreign(owner.as_ref()).await;
        self.inner.cart.read().await.clone()
    }

    /// Look up a line by product and variant.
    pub async fn get_item(&self, product_id: &ProductId, variant: Option<&str>) -> Option<CartItem> {
        self.snapshot()
            .await
            .get_item(product_id, variant)
            .cloned()
    }

    /// Total quantity as last reported by the server.
    pub async fn total_items(&self) -> u32 {
        self.snapshot().await.total_items
    }

    /// Total price as last reported by the server.
    pub async fn total_price(&self) -> Decimal {
        self.snapshot().await.total_price
    }

    // =========================================================================
    // Server round-trips
    // =========================================================================

    /// Reload the cart from the server (`GET /carts?email=`).
    ///
    /// On failure the local cart is reset to empty and an error toast is
    /// emitted; there is no retry.
    ///
    /// # Errors
    ///
    /// Returns the API error after resetting the snapshot.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&self) -> Result<Cart, CartError> {
        let _guard = self.inner.mutation.lock().await;
        let Some(owner) = self.inner.api.session().current_email() else {
            let empty = Cart::empty(None);
            *self.inner.cart.write().await = empty.clone();
            return Ok(empty);
        };
        self.discard_if_foreign(Some(&owner)).await;
        self.reload(&owner).await
    }

    /// Add one unit of `product` (`POST /carts`).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`] without calling the API when no
    /// user is signed in, or the API error.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(&self, product: &Product, variant: Option<&str>) -> Result<Cart, CartError> {
        let owner = self.require_owner().await?;
        let _guard = self.inner.mutation.lock().await;

        let mut item = CartItem::single(
            product.id.clone(),
            product.name.clone(),
            product.image.clone(),
            product.price,
            product.discount,
        );
        if let Some(variant) = variant {
            item = item.with_variant(variant);
        }

        let request = AddItemsRequest {
            owner_email: &owner,
            cart_items: [&item],
        };
        match self
            .inner
            .api
            .post_json::<Cart, _>(Access::Secure, &["carts"], &request)
            .await
        {
            Ok(cart) => {
                let cart = self.replace(&owner, cart).await;
                self.inner
                    .notifier
                    .notify(Toast::success(format!("{} added to cart", product.name)));
                Ok(cart)
            }
            Err(e) => Err(self.fail("add to cart", e)),
        }
    }

    /// Replace a line with `item` (`PATCH /carts`).
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`], [`CartError::InvalidQuantity`] for
    /// a zero quantity, or the API error.
    #[instrument(skip(self, item), fields(product_id = %item.product_id))]
    pub async fn update_cart(&self, item: &CartItem) -> Result<Cart, CartError> {
        let owner = self.require_owner().await?;
        if item.quantity == 0 {
            return Err(self.reject(CartError::InvalidQuantity(0)));
        }
        let _guard = self.inner.mutation.lock().await;

        let request = UpdateItemRequest {
            owner_email: &owner,
            cart_item: item,
        };
        match self
            .inner
            .api
            .patch_json::<Cart, _>(Access::Secure, &["carts"], &request)
            .await
        {
            Ok(cart) => Ok(self.replace(&owner, cart).await),
            Err(e) => Err(self.fail("update cart", e)),
        }
    }

    /// Change a line's quantity (`PATCH /carts/increase`), then refetch.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`], [`CartError::InvalidQuantity`] for
    /// a zero delta, or the API error from either request.
    #[instrument(skip(self, change), fields(product_id = %change.product_id, delta = change.delta))]
    pub async fn update_quantity(&self, change: &QuantityChange) -> Result<Cart, CartError> {
        let owner = self.require_owner().await?;
        if change.delta == 0 {
            return Err(self.reject(CartError::InvalidQuantity(0)));
        }
        let _guard = self.inner.mutation.lock().await;

        let request = QuantityRequest {
            owner_email: &owner,
            product_id: &change.product_id,
            variant: change.variant.as_deref(),
            quantity: change.delta,
        };
        if let Err(e) = self
            .inner
            .api
            .patch(Access::Secure, &["carts", "increase"], &request)
            .await
        {
            return Err(self.fail("update quantity", e));
        }
        self.reload(&owner).await
    }

    /// Remove a line (`DELETE /carts/item`), then refetch.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`] or the API error from either
    /// request.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_from_cart(
        &self,
        product_id: &ProductId,
        variant: Option<&str>,
    ) -> Result<Cart, CartError> {
        let owner = self.require_owner().await?;
        let _guard = self.inner.mutation.lock().await;

        let query = ItemQuery {
            email: &owner,
            product_id,
            variant,
        };
        if let Err(e) = self
            .inner
            .api
            .delete(Access::Secure, &["carts", "item"], &query)
            .await
        {
            return Err(self.fail("remove item", e));
        }
        self.reload(&owner).await
    }

    /// Take one unit off a line, removing the line when it is at quantity 1.
    ///
    /// The quantity is read from a fresh server copy, so this works on a
    /// store that has never been loaded. A line that is not in the cart
    /// leaves it unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`] or the API error from any request.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn decrement(
        &self,
        product_id: &ProductId,
        variant: Option<&str>,
    ) -> Result<Cart, CartError> {
        let owner = self.require_owner().await?;
        let _guard = self.inner.mutation.lock().await;

        let current = self.reload(&owner).await?;
        let Some(item) = current.get_item(product_id, variant) else {
            tracing::debug!("Line not in cart; nothing to decrement");
            return Ok(current);
        };

        let sent = if item.quantity <= 1 {
            let query = ItemQuery {
                email: &owner,
                product_id,
                variant,
            };
            self.inner
                .api
                .delete(Access::Secure, &["carts", "item"], &query)
                .await
        } else {
            let request = QuantityRequest {
                owner_email: &owner,
                product_id,
                variant,
                quantity: -1,
            };
            self.inner
                .api
                .patch(Access::Secure, &["carts", "increase"], &request)
                .await
        };
        if let Err(e) = sent {
            return Err(self.fail("update quantity", e));
        }
        self.reload(&owner).await
    }

    /// Empty the cart (`DELETE /carts/clear`), then refetch.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`] or the API error from either
    /// request.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<Cart, CartError> {
        let owner = self.require_owner().await?;
        let _guard = self.inner.mutation.lock().await;

        if let Err(e) = self
            .inner
            .api
            .delete(Access::Secure, &["carts", "clear"], &OwnerQuery { email: &owner })
            .await
        {
            return Err(self.fail("clear cart", e));
        }
        self.reload(&owner).await
    }

    /// Follow the session: drop the snapshot on logout or user change and
    /// refetch for the new user.
    ///
    /// The task ends when the session is dropped.
    #[must_use]
    pub fn spawn_session_sync(&self) -> JoinHandle<()> {
        let store = self.clone();
        let mut users = self.inner.api.session().subscribe();
        tokio::spawn(async move {
            while users.changed().await.is_ok() {
                let owner = users.borrow_and_update().as_ref().map(|u| u.email.clone());
                store.discard_if_foreign(owner.as_ref()).await;
                if owner.is_some() {
                    // Failures are already reported through the notifier.
                    let _ = store.fetch_cart().await;
                }
            }
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// `GET` the cart for `owner`; caller holds the mutation guard.
    async fn reload(&self, owner: &Email) -> Result<Cart, CartError> {
        match self
            .inner
            .api
            .get_json::<Cart, _>(Access::Secure, &["carts"], &OwnerQuery { email: owner })
            .await
        {
            Ok(cart) => Ok(self.replace(owner, cart).await),
            Err(ApiError::NotFound(_)) => {
                // Carts are created lazily on first add.
                let empty = Cart::empty(Some(owner.clone()));
                *self.inner.cart.write().await = empty.clone();
                Ok(empty)
            }
            Err(e) => {
                *self.inner.cart.write().await = Cart::empty(Some(owner.clone()));
                Err(self.fail("load cart", e))
            }
        }
    }

    /// Install a server cart as the snapshot for `owner`.
    async fn replace(&self, owner: &Email, mut cart: Cart) -> Cart {
        if let Some(reported) = &cart.owner_email
            && reported != owner
        {
            tracing::warn!(%reported, expected = %owner, "Server returned a cart for another owner");
        }
        cart.owner_email = Some(owner.clone());

        if !cart.totals_match() {
            tracing::warn!(
                reported_items = cart.total_items,
                computed_items = cart.computed_total_items(),
                reported_price = %cart.total_price,
                computed_price = %cart.computed_total_price(),
                "Cart totals from server disagree with its lines"
            );
        }
        *self.inner.cart.write().await = cart.clone();
        cart
    }

    async fn discard_if_foreign(&self, owner: Option<&Email>) {
        let mut cart = self.inner.cart.write().await;
        if cart.owner_email.as_ref() != owner {
            tracing::debug!("Discarding cart snapshot of previous user");
            *cart = Cart::empty(owner.cloned());
        }
    }

    async fn require_owner(&self) -> Result<Email, CartError> {
        let Some(owner) = self.inner.api.session().current_email() else {
            self.inner
                .notifier
                .notify(Toast::info("Please log in to manage your cart"));
            return Err(CartError::NotSignedIn);
        };
        self.discard_if_foreign(Some(&owner)).await;
        Ok(owner)
    }

    fn reject(&self, err: CartError) -> CartError {
        self.inner.notifier.notify(Toast::error(err.to_string()));
        err
    }

    fn fail(&self, action: &str, err: ApiError) -> CartError {
        tracing::error!(error = %err, action, "Cart request failed");
        self.inner
            .notifier
            .notify(Toast::error(format!("Could not {action}: {err}")));
        CartError::Api(err)
    }
}
