//! Product catalog client.
//!
//! Product reads are cached with `moka` (TTL from configuration, 5 minutes by
//! default). Filtering and sorting happen client-side over the fetched list,
//! see [`ProductFilter`].

mod cache;
mod filter;

pub use filter::{ProductFilter, ProductSort};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use petverse_core::{Discount, ProductId, discounted_price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::api::{Access, ApiClient, InsertResult, NO_QUERY, decode_each};
use crate::error::ApiError;

use cache::{CacheKey, CacheValue};

/// A product as listed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub pet_type: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default)]
    pub discount: Discount,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Price after the product's discount.
    #[must_use]
    pub fn sale_price(&self) -> Decimal {
        discounted_price(self.price, self.discount)
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Payload for `POST /add-product`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub image: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pet_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub discount: Discount,
    pub stock: u32,
    pub description: String,
}

/// Client for products.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    api: ApiClient,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogClient {
    /// Create a catalog client caching reads for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1000).time_to_live(ttl).build();
        Self {
            inner: Arc::new(CatalogClientInner { api, cache }),
        }
    }

    /// All products (`GET /products`).
    ///
    /// Entries that fail to decode, such as a discount above 100%, are
    /// logged and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&CacheKey::Products).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let raw: Vec<serde_json::Value> = self
            .inner
            .api
            .get_json(Access::Public, &["products"], NO_QUERY)
            .await?;
        let products: Arc<Vec<Product>> = Arc::new(decode_each(raw, "product"));

        self.inner
            .cache
            .insert(CacheKey::Products, CacheValue::Products(Arc::clone(&products)))
            .await;
        Ok(products)
    }

    /// Filter and sort the product list client-side.
    ///
    /// # Errors
    ///
    /// Returns an error if the product list cannot be fetched.
    pub async fn search(&self, filter: &ProductFilter) -> Result<Vec<Product>, ApiError> {
        let products = self.list_products().await?;
        Ok(filter.apply(&products))
    }

    /// A single product (`GET /product/:id`).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown IDs, or any other API error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .inner
            .api
            .get_json(Access::Public, &["product", id.as_str()], NO_QUERY)
            .await?;

        self.inner
            .cache
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Create a product (`POST /add-product`, admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn add_product(&self, product: &NewProduct) -> Result<InsertResult, ApiError> {
        let result = self
            .inner
            .api
            .post_json(Access::Secure, &["add-product"], product)
            .await?;
        self.inner.cache.invalidate(&CacheKey::Products).await;
        Ok(result)
    }

    /// Drop every cached product response.
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_deserialize_product() {
        let json = r#"{
            "_id": "66a1",
            "name": "Chicken Jerky",
            "image": "https://img/jerky.png",
            "category": "treats",
            "petType": "dog",
            "price": 12.5,
            "discount": 20,
            "stock": 4,
            "rating": 4.6
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id.as_str(), "66a1");
        assert_eq!(product.pet_type.as_deref(), Some("dog"));
        assert_eq!(product.sale_price(), Decimal::from_str("10.00").unwrap());
        assert!(product.in_stock());
        assert!(product.brand.is_none());
    }

    #[test]
    fn test_new_product_wire_shape() {
        let product = NewProduct {
            name: "Cat Tree".to_string(),
            image: "https://img/tree.png".to_string(),
            category: "furniture".to_string(),
            pet_type: Some("cat".to_string()),
            brand: None,
            price: Decimal::from_str("89.99").unwrap(),
            discount: Discount::NONE,
            stock: 3,
            description: "Three levels".to_string(),
        };

        let value = serde_json::to_value(&product).unwrap();
        assert_eq!(value["petType"], "cat");
        assert_eq!(value["price"], 89.99);
        assert!(value.get("brand").is_none());
    }
}
