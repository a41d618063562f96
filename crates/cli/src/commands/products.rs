//! Catalog commands.

use petverse_client::AppState;
use petverse_client::catalog::{Product, ProductFilter, ProductSort};
use petverse_core::ProductId;

use crate::ProductFilterArgs;

pub async fn list(state: &AppState, args: ProductFilterArgs) -> Result<(), Box<dyn std::error::Error>> {
    let sort: ProductSort = args.sort.parse()?;
    let filter = ProductFilter {
        search: args.search,
        category: args.category,
        pet_type: args.pet_type,
        min_price: args.min_price,
        max_price: args.max_price,
        in_stock_only: args.in_stock,
        sort,
    };

    let products = state.catalog().search(&filter).await?;
    for product in &products {
        log_product(product);
    }
    tracing::info!(count = products.len(), "Products");
    Ok(())
}

pub async fn show(state: &AppState, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let product = state.catalog().get_product(&ProductId::new(id)).await?;
    log_product(&product);
    if !product.description.is_empty() {
        tracing::info!("{}", product.description);
    }
    Ok(())
}

fn log_product(product: &Product) {
    tracing::info!(
        id = %product.id,
        category = %product.category,
        price = %product.price,
        discount = %product.discount.percent(),
        sale_price = %product.sale_price(),
        stock = product.stock,
        "{}",
        product.name
    );
}
