//! Admin dashboard aggregations.
//!
//! Pure functions over fetched orders and appointments. Refunded payments
//! count as orders by status but never as revenue.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use petverse_core::{AppointmentKind, AppointmentStatus, PaymentStatus, ProductId, round_money};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use crate::appointments::{Appointment, AppointmentClient, AppointmentError};
use crate::error::ApiError;
use crate::payments::{Payment, PaymentClient};

/// Revenue collected on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Decimal,
    pub orders: usize,
}

/// Units sold of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSales {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub revenue: Decimal,
}

/// Headline numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub revenue: Decimal,
    pub orders: usize,
    pub customers: usize,
    pub average_order_value: Decimal,
}

fn counts_as_revenue(payment: &Payment) -> bool {
    payment.status != PaymentStatus::Refunded
}

/// Revenue per calendar day (UTC), oldest first.
#[must_use]
pub fn revenue_by_day(payments: &[Payment]) -> Vec<DailyRevenue> {
    let mut days: BTreeMap<NaiveDate, (Decimal, usize)> = BTreeMap::new();
    for payment in payments.iter().filter(|p| counts_as_revenue(p)) {
        let entry = days.entry(payment.date.date_naive()).or_default();
        entry.0 += payment.amount;
        entry.1 += 1;
    }
    days.into_iter()
        .map(|(date, (revenue, orders))| DailyRevenue {
            date,
            revenue: round_money(revenue),
            orders,
        })
        .collect()
}

/// Number of orders in each payment status.
#[must_use]
pub fn orders_by_status(payments: &[Payment]) -> BTreeMap<PaymentStatus, usize> {
    let mut counts = BTreeMap::new();
    for payment in payments {
        *counts.entry(payment.status).or_insert(0) += 1;
    }
    counts
}

/// Best-selling products by units, at most `limit`.
///
/// Ties are broken by revenue, then name.
#[must_use]
pub fn top_products(payments: &[Payment], limit: usize) -> Vec<ProductSales> {
    let mut sales: HashMap<&ProductId, ProductSales> = HashMap::new();
    for item in payments
        .iter()
        .filter(|p| counts_as_revenue(p))
        .flat_map(|p| &p.cart_items)
    {
        let entry = sales.entry(&item.product_id).or_insert_with(|| ProductSales {
            product_id: item.product_id.clone(),
            name: item.product_name.clone(),
            quantity: 0,
            revenue: Decimal::ZERO,
        });
        entry.quantity += item.quantity;
        entry.revenue += item.price;
    }

    let mut ranked: Vec<ProductSales> = sales.into_values().collect();
    ranked.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked.truncate(limit);
    for entry in &mut ranked {
        entry.revenue = round_money(entry.revenue);
    }
    ranked
}

/// Appointment count per service, most booked first.
#[must_use]
pub fn appointments_by_service(appointments: &[Appointment]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for appointment in appointments {
        *counts.entry(appointment.service.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(service, count)| (service.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Appointment count per status, in lifecycle order; zero counts included.
#[must_use]
pub fn appointments_by_status(appointments: &[Appointment]) -> Vec<(AppointmentStatus, usize)> {
    [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ]
    .into_iter()
    .map(|status| {
        let count = appointments.iter().filter(|a| a.status == status).count();
        (status, count)
    })
    .collect()
}

/// Revenue, order count, distinct customers and average order value.
#[must_use]
pub fn summary(payments: &[Payment]) -> Summary {
    let paid: Vec<&Payment> = payments.iter().filter(|p| counts_as_revenue(p)).collect();
    let revenue: Decimal = paid.iter().map(|p| p.amount).sum();
    let customers: HashSet<_> = paid.iter().map(|p| &p.email).collect();

    let average_order_value = if paid.is_empty() {
        Decimal::ZERO
    } else {
        round_money(revenue / Decimal::from(paid.len()))
    };

    Summary {
        revenue: round_money(revenue),
        orders: paid.len(),
        customers: customers.len(),
        average_order_value,
    }
}

/// Everything the admin dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub summary: Summary,
    pub revenue_by_day: Vec<DailyRevenue>,
    pub orders_by_status: BTreeMap<PaymentStatus, usize>,
    pub top_products: Vec<ProductSales>,
    pub appointments_by_service: Vec<(String, usize)>,
    pub appointments_by_status: Vec<(AppointmentStatus, usize)>,
}

impl Dashboard {
    /// Aggregate already-fetched data.
    #[must_use]
    pub fn build(payments: &[Payment], appointments: &[Appointment], top: usize) -> Self {
        Self {
            summary: summary(payments),
            revenue_by_day: revenue_by_day(payments),
            orders_by_status: orders_by_status(payments),
            top_products: top_products(payments, top),
            appointments_by_service: appointments_by_service(appointments),
            appointments_by_status: appointments_by_status(appointments),
        }
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),
}

/// Fetch orders and both appointment collections concurrently and aggregate
/// them.
///
/// # Errors
///
/// Returns the first request error.
#[instrument(skip(payments, appointments))]
pub async fn load_dashboard(
    payments: &PaymentClient,
    appointments: &AppointmentClient,
    top: usize,
) -> Result<Dashboard, DashboardError> {
    let (orders, grooming, healthcare) = tokio::try_join!(
        async { payments.orders().await.map_err(DashboardError::from) },
        async {
            appointments
                .all_appointments(AppointmentKind::Grooming)
                .await
                .map_err(DashboardError::from)
        },
        async {
            appointments
                .all_appointments(AppointmentKind::Healthcare)
                .await
                .map_err(DashboardError::from)
        },
    )?;

    let mut booked = grooming;
    booked.extend(healthcare);
    tracing::debug!(orders = orders.len(), appointments = booked.len(), "Dashboard data loaded");
    Ok(Dashboard::build(&orders, &booked, top))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};
    use petverse_core::{CartItem, Discount, Email, PaymentId};

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(id: &str, name: &str, price: &str, quantity: u32) -> CartItem {
        let mut item = CartItem::single(ProductId::new(id), name, "", dec(price), Discount::NONE);
        item.quantity = quantity;
        item.price *= Decimal::from(quantity);
        item
    }

    fn payment(email: &str, day: u32, amount: &str, status: PaymentStatus, items: Vec<CartItem>) -> Payment {
        Payment {
            id: PaymentId::new(format!("{email}-{day}")),
            email: Email::parse(email).unwrap(),
            transaction_id: "pi_1".to_string(),
            amount: dec(amount),
            cart_items: items,
            date: Utc.with_ymd_and_hms(2026, 10, day, 15, 0, 0).unwrap(),
            status,
        }
    }

    fn payments() -> Vec<Payment> {
        vec![
            payment("a@example.com", 1, "20.00", PaymentStatus::Paid, vec![item("p1", "Leash", "10.00", 2)]),
            payment("b@example.com", 1, "15.50", PaymentStatus::Shipped, vec![item("p2", "Bowl", "15.50", 1)]),
            payment("a@example.com", 3, "31.00", PaymentStatus::Delivered, vec![
                item("p2", "Bowl", "15.50", 2),
            ]),
            payment("c@example.com", 3, "99.00", PaymentStatus::Refunded, vec![item("p3", "Crate", "99.00", 1)]),
        ]
    }

    #[test]
    fn test_revenue_by_day_excludes_refunds() {
        let days = revenue_by_day(&payments());
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].revenue, dec("35.50"));
        assert_eq!(days[0].orders, 2);
        assert_eq!(days[1].revenue, dec("31.00"));
        assert_eq!(days[1].orders, 1);
    }

    #[test]
    fn test_orders_by_status_counts_everything() {
        let counts = orders_by_status(&payments());
        assert_eq!(counts.get(&PaymentStatus::Refunded), Some(&1));
        assert_eq!(counts.values().sum::<usize>(), 4);
    }

    #[test]
    fn test_top_products() {
        let top = top_products(&payments(), 5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Bowl");
        assert_eq!(top[0].quantity, 3);
        assert_eq!(top[0].revenue, dec("46.50"));
        assert_eq!(top[1].name, "Leash");

        assert_eq!(top_products(&payments(), 1).len(), 1);
    }

    #[test]
    fn test_summary() {
        let summary = summary(&payments());
        assert_eq!(summary.revenue, dec("66.50"));
        assert_eq!(summary.orders, 3);
        assert_eq!(summary.customers, 2);
        assert_eq!(summary.average_order_value, dec("22.17"));

        assert_eq!(super::summary(&[]), Summary::default());
    }
}
