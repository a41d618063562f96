//! Cart and checkout commands.

use petverse_client::AppState;
use petverse_client::cart::QuantityChange;
use petverse_core::{Cart, ProductId};
use secrecy::ExposeSecret;

use crate::CartAction;

pub async fn run(state: &AppState, action: CartAction) -> Result<(), Box<dyn std::error::Error>> {
    let cart = state.cart();
    let updated = match action {
        CartAction::Show => cart.fetch_cart().await?,
        CartAction::Add {
            product_id,
            variant,
        } => {
            let product = state.catalog().get_product(&ProductId::new(product_id)).await?;
            cart.add_to_cart(&product, variant.as_deref()).await?
        }
        CartAction::Inc {
            product_id,
            variant,
        } => {
            cart.update_quantity(&QuantityChange::increase(ProductId::new(product_id), variant))
                .await?
        }
        CartAction::Dec {
            product_id,
            variant,
        } => {
            cart.decrement(&ProductId::new(product_id), variant.as_deref())
                .await?
        }
        CartAction::Remove {
            product_id,
            variant,
        } => {
            cart.remove_from_cart(&ProductId::new(product_id), variant.as_deref())
                .await?
        }
        CartAction::Clear => cart.clear_cart().await?,
    };
    log_cart(&updated);
    Ok(())
}

/// Create a payment intent for the cart, and record the payment when the
/// gateway already confirmed it.
pub async fn checkout(
    state: &AppState,
    transaction_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pending = state.checkout().begin().await?;
    log_cart(&pending.cart);

    let Some(transaction_id) = transaction_id else {
        tracing::info!(
            amount = %pending.intent.amount,
            client_secret = pending.intent.client_secret.expose_secret(),
            "Payment intent created; confirm it with the gateway, then rerun with --transaction-id"
        );
        return Ok(());
    };

    let record = state.checkout().complete(pending, transaction_id).await?;
    tracing::info!(
        amount = %record.amount,
        transaction_id = %record.transaction_id,
        items = record.cart_items.len(),
        "Payment recorded"
    );
    Ok(())
}

fn log_cart(cart: &Cart) {
    for item in &cart.cart_items {
        tracing::info!(
            product_id = %item.product_id,
            variant = item.variant.as_deref().unwrap_or("-"),
            quantity = item.quantity,
            price = %item.price,
            "{}",
            item.product_name
        );
    }
    tracing::info!(
        items = cart.total_items,
        total = %cart.total_price,
        "Cart"
    );
}
