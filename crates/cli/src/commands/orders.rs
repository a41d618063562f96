//! Order history and admin dashboard commands.

use petverse_client::AppState;
use petverse_client::analytics::load_dashboard;

use super::require_email;

pub async fn list(state: &AppState, all: bool) -> Result<(), Box<dyn std::error::Error>> {
    let payments = if all {
        state.payments().orders().await?
    } else {
        let email = require_email(state)?;
        state.payments().my_payments(&email).await?
    };

    for payment in &payments {
        tracing::info!(
            id = %payment.id,
            date = %payment.date.date_naive(),
            email = %payment.email,
            amount = %payment.amount,
            status = %payment.status,
            items = payment.cart_items.len(),
            "{}",
            payment.transaction_id
        );
    }
    tracing::info!(count = payments.len(), "Orders");
    Ok(())
}

pub async fn dashboard(state: &AppState, top: usize) -> Result<(), Box<dyn std::error::Error>> {
    let dashboard = load_dashboard(state.payments(), state.appointments(), top).await?;

    let summary = &dashboard.summary;
    tracing::info!(
        revenue = %summary.revenue,
        orders = summary.orders,
        customers = summary.customers,
        average_order_value = %summary.average_order_value,
        "Summary"
    );
    for day in &dashboard.revenue_by_day {
        tracing::info!(date = %day.date, revenue = %day.revenue, orders = day.orders, "Revenue");
    }
    for (status, count) in &dashboard.orders_by_status {
        tracing::info!(%status, count, "Orders by status");
    }
    for product in &dashboard.top_products {
        tracing::info!(
            product_id = %product.product_id,
            quantity = product.quantity,
            revenue = %product.revenue,
            "Top product: {}",
            product.name
        );
    }
    for (service, count) in &dashboard.appointments_by_service {
        tracing::info!(%service, count, "Appointments by service");
    }
    for (status, count) in &dashboard.appointments_by_status {
        tracing::info!(%status, count, "Appointments by status");
    }
    Ok(())
}
