//! In-memory catalog and customer registry for tests and local runs.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::catalog::{Catalog, Category, CategoryId, Product, ProductId};
use crate::clients::{Client, ClientDirectory};
use crate::errors::{Result, ShopError};

#[derive(Debug, Default)]
struct CatalogData {
    categories: BTreeMap<CategoryId, (String, Option<CategoryId>)>,
    products: BTreeMap<ProductId, Product>,
}

/// Catalog held in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    data: RwLock<CatalogData>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_category(&self, id: i64, title: &str, parent: Option<i64>) {
        self.data
            .write()
            .await
            .categories
            .insert(CategoryId(id), (title.to_string(), parent.map(CategoryId)));
    }

    pub async fn add_product(&self, id: i64, title: &str, price: &str, category: i64) {
        let product = Product {
            id: ProductId(id),
            title: title.to_string(),
            description: format!("{title} description"),
            price: price.parse().unwrap_or(Decimal::ZERO),
            category_id: CategoryId(category),
        };
        self.data.write().await.products.insert(product.id, product);
    }

    pub async fn set_price(&self, id: i64, price: Decimal) {
        if let Some(product) = self.data.write().await.products.get_mut(&ProductId(id)) {
            product.price = price;
        }
    }

    pub async fn remove_product(&self, id: i64) {
        self.data.write().await.products.remove(&ProductId(id));
    }
}

impl CatalogData {
    fn category(&self, id: CategoryId) -> Option<Category> {
        self.categories.get(&id).map(|(title, parent)| Category {
            id,
            title: title.clone(),
            parent_id: *parent,
            has_subcategories: self.categories.values().any(|(_, p)| *p == Some(id)),
        })
    }
}

fn by_title<T>(mut items: Vec<T>, title: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| title(a).cmp(title(b)));
    items
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn category(&self, id: CategoryId) -> Result<Category> {
        self.data
            .read()
            .await
            .category(id)
            .ok_or_else(|| ShopError::not_found("Category", id))
    }

    async fn categories(&self, parent: Option<CategoryId>) -> Result<Vec<Category>> {
        let data = self.data.read().await;
        let children: Vec<Category> = data
            .categories
            .iter()
            .filter(|(_, (_, p))| *p == parent)
            .filter_map(|(id, _)| data.category(*id))
            .collect();
        Ok(by_title(children, |c: &Category| c.title.as_str()))
    }

    async fn products_in(&self, category: CategoryId) -> Result<Vec<Product>> {
        let data = self.data.read().await;
        let products: Vec<Product> = data
            .products
            .values()
            .filter(|p| p.category_id == category)
            .cloned()
            .collect();
        Ok(by_title(products, |p: &Product| p.title.as_str()))
    }

    async fn product(&self, id: ProductId) -> Result<Product> {
        self.data
            .read()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| ShopError::not_found("Product", id))
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let data = self.data.read().await;
        let products: Vec<Product> = ids
            .iter()
            .filter_map(|id| data.products.get(id).cloned())
            .collect();
        Ok(by_title(products, |p: &Product| p.title.as_str()))
    }
}

/// Customer registry held in memory
#[derive(Debug, Default)]
pub struct InMemoryClients {
    clients: RwLock<BTreeMap<i64, Client>>,
}

impl InMemoryClients {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientDirectory for InMemoryClients {
    async fn upsert(&self, client: &Client) -> Result<bool> {
        let previous = self.clients.write().await.insert(client.id, client.clone());
        Ok(previous.is_none())
    }

    async fn all(&self) -> Result<Vec<Client>> {
        Ok(self.clients.read().await.values().cloned().collect())
    }
}
