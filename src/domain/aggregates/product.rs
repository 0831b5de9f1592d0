//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{parse_price, PriceError};

/// Catalog record as mirrored from the `products` path. Immutable once fetched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub product_id: String,
    pub category: String,
    pub name: String,
    /// Raw text as stored remotely; use [`Product::unit_price`] to read it.
    pub price: String,
    pub description: String,
    pub image_urls: Vec<String>,
    pub ebook_url: Option<String>,
}

impl Product {
    pub fn unit_price(&self) -> Result<Decimal, PriceError> { parse_price(&self.price) }

    /// Soft default for legacy call sites: an unreadable price becomes zero, and says so.
    pub fn unit_price_or_zero(&self) -> Decimal {
        self.unit_price().unwrap_or_else(|error| {
            tracing::warn!(product_id = %self.product_id, raw_price = %self.price, %error, "Unparseable product price, defaulting to zero");
            Decimal::ZERO
        })
    }

    pub fn primary_image(&self) -> Option<&str> { self.image_urls.first().map(String::as_str) }

    pub fn in_category(&self, category: &str) -> bool { self.category.to_lowercase() == category.to_lowercase() }
}

/// Promotional banner entry under `banners`; only the `link` child is read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Banner {
    pub link: String,
}
