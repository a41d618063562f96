//! Client-side product filtering and sorting.

use std::cmp::Ordering;

use rust_decimal::Decimal;

use super::Product;

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    /// Keep the API's order.
    #[default]
    Featured,
    PriceLowToHigh,
    PriceHighToLow,
    Newest,
    TopRated,
    Name,
}

impl std::str::FromStr for ProductSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "featured" => Ok(Self::Featured),
            "price-asc" => Ok(Self::PriceLowToHigh),
            "price-desc" => Ok(Self::PriceHighToLow),
            "newest" => Ok(Self::Newest),
            "rating" => Ok(Self::TopRated),
            "name" => Ok(Self::Name),
            _ => Err(format!(
                "invalid sort: {s} (expected featured, price-asc, price-desc, newest, rating, name)"
            )),
        }
    }
}

/// Filter criteria for a product listing.
///
/// Prices compare against the discounted sale price. Text and category
/// matches are case-insensitive; empty strings mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub pet_type: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock_only: bool,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// Apply the filter and sort to `products`.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> Vec<Product> {
        let search = normalized(self.search.as_deref());
        let category = normalized(self.category.as_deref());
        let pet_type = normalized(self.pet_type.as_deref());

        let mut matches: Vec<Product> = products
            .iter()
            .filter(|p| {
                search.as_deref().is_none_or(|needle| {
                    p.name.to_lowercase().contains(needle)
                        || p.brand
                            .as_deref()
                            .is_some_and(|b| b.to_lowercase().contains(needle))
                })
            })
            .filter(|p| {
                category
                    .as_deref()
                    .is_none_or(|c| p.category.eq_ignore_ascii_case(c))
            })
            .filter(|p| {
                pet_type.as_deref().is_none_or(|t| {
                    p.pet_type
                        .as_deref()
                        .is_some_and(|pt| pt.eq_ignore_ascii_case(t))
                })
            })
            .filter(|p| {
                let price = p.sale_price();
                self.min_price.is_none_or(|min| price >= min)
                    && self.max_price.is_none_or(|max| price <= max)
            })
            .filter(|p| !self.in_stock_only || p.in_stock())
            .cloned()
            .collect();

        match self.sort {
            ProductSort::Featured => {}
            ProductSort::PriceLowToHigh => matches.sort_by_key(Product::sale_price),
            ProductSort::PriceHighToLow => {
                matches.sort_by_key(|p| std::cmp::Reverse(p.sale_price()));
            }
            ProductSort::Newest => matches.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::TopRated => matches.sort_by(|a, b| {
                b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal)
            }),
            ProductSort::Name => {
                matches.sort_by_key(|p| p.name.to_lowercase());
            }
        }

        matches
    }
}

fn normalized(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}
