//! Catalog entities and the read-only lookup the bot consumes.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Result;

/// Primary key of a product row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub i64);

/// Primary key of a category row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(ProductId)
    }
}

impl FromStr for CategoryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(CategoryId)
    }
}

/// A node of the category tree
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub parent_id: Option<CategoryId>,
    /// Leaf categories list products, inner ones list subcategories
    pub has_subcategories: bool,
}

/// A sellable product
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    /// Price in major units, two decimal places
    pub price: Decimal,
    pub category_id: CategoryId,
}

/// Read-only access to the category tree and product rows.
///
/// Listings are ordered by title. Lookups of a single entity fail with
/// `ShopError::NotFound` when it no longer exists; `products` silently skips
/// missing ids.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn category(&self, id: CategoryId) -> Result<Category>;

    /// Children of `parent`, or the root categories when `parent` is `None`
    async fn categories(&self, parent: Option<CategoryId>) -> Result<Vec<Category>>;

    async fn products_in(&self, category: CategoryId) -> Result<Vec<Product>>;

    async fn product(&self, id: ProductId) -> Result<Product>;

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;
}
