//! # Database Module
//!
//! Postgres persistence for the catalog, the customer registry and
//! (optionally) the order ledger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, info};

use crate::catalog::{Catalog, Category, CategoryId, Product, ProductId};
use crate::clients::{Client, ClientDirectory};
use crate::errors::{Result, ShopError};
use crate::ledger::{AppendOutcome, OrderLedger, OrderRecord};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id BIGSERIAL PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            parent_id BIGINT REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id BIGSERIAL PRIMARY KEY,
            title VARCHAR(255) NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price NUMERIC(9, 2) NOT NULL,
            category_id BIGINT NOT NULL REFERENCES categories(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clients (
            id BIGINT PRIMARY KEY,
            first_name VARCHAR(255) NOT NULL,
            last_name VARCHAR(255),
            username VARCHAR(255),
            is_premium BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // No foreign key on product_id: sales outlive catalog rows
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id BIGSERIAL PRIMARY KEY,
            charge_id VARCHAR(255) NOT NULL,
            buyer_id BIGINT NOT NULL,
            product_id BIGINT,
            buyer_name VARCHAR(255) NOT NULL,
            delivery_location TEXT NOT NULL,
            product_title VARCHAR(255) NOT NULL,
            quantity BIGINT,
            amount NUMERIC(12, 2) NOT NULL,
            ordered_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS orders_charge_id_idx ON orders (charge_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS products_category_idx ON products (category_id)")
        .execute(pool)
        .await?;

    info!("Database schema initialized successfully");
    Ok(())
}

#[derive(FromRow)]
struct CategoryRow {
    id: i64,
    title: String,
    parent_id: Option<i64>,
    has_subcategories: bool,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: CategoryId(row.id),
            title: row.title,
            parent_id: row.parent_id.map(CategoryId),
            has_subcategories: row.has_subcategories,
        }
    }
}

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    title: String,
    description: String,
    price: Decimal,
    category_id: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: ProductId(row.id),
            title: row.title,
            description: row.description,
            price: row.price,
            category_id: CategoryId(row.category_id),
        }
    }
}

#[derive(FromRow)]
struct ClientRow {
    id: i64,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
    is_premium: bool,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            username: row.username,
            is_premium: row.is_premium,
        }
    }
}

#[derive(FromRow)]
struct OrderRow {
    charge_id: String,
    buyer_id: i64,
    product_id: Option<i64>,
    buyer_name: String,
    delivery_location: String,
    product_title: String,
    quantity: Option<i64>,
    amount: Decimal,
    ordered_at: DateTime<Utc>,
}

impl From<OrderRow> for OrderRecord {
    fn from(row: OrderRow) -> Self {
        OrderRecord {
            charge_id: row.charge_id,
            buyer_id: row.buyer_id,
            product_id: row.product_id.map(ProductId),
            buyer_name: row.buyer_name,
            delivery_location: row.delivery_location,
            product_title: row.product_title,
            quantity: row.quantity.and_then(|q| u32::try_from(q).ok()),
            amount: row.amount,
            ordered_at: row.ordered_at,
        }
    }
}

const CATEGORY_COLUMNS: &str = r#"
    c.id, c.title, c.parent_id,
    EXISTS (SELECT 1 FROM categories sub WHERE sub.parent_id = c.id) AS has_subcategories
"#;

/// Postgres-backed catalog, customer registry and order ledger
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create a category and return its id
    pub async fn create_category(&self, title: &str, parent: Option<CategoryId>) -> Result<CategoryId> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO categories (title, parent_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(title)
        .bind(parent.map(|p| p.0))
        .fetch_one(&self.pool)
        .await?;

        debug!(category_id = id, title = %title, "Created category");
        Ok(CategoryId(id))
    }

    /// Create a product and return its id
    pub async fn create_product(
        &self,
        title: &str,
        description: &str,
        price: Decimal,
        category: CategoryId,
    ) -> Result<ProductId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO products (title, description, price, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(price)
        .bind(category.0)
        .fetch_one(&self.pool)
        .await?;

        debug!(product_id = id, title = %title, "Created product");
        Ok(ProductId(id))
    }
}

#[async_trait]
impl Catalog for PgStore {
    async fn category(&self, id: CategoryId) -> Result<Category> {
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories c WHERE c.id = $1");
        sqlx::query_as::<_, CategoryRow>(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(Category::from)
            .ok_or_else(|| ShopError::not_found("Category", id))
    }

    async fn categories(&self, parent: Option<CategoryId>) -> Result<Vec<Category>> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories c \
             WHERE c.parent_id IS NOT DISTINCT FROM $1 ORDER BY c.title, c.id"
        );
        let rows = sqlx::query_as::<_, CategoryRow>(&query)
            .bind(parent.map(|p| p.0))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn products_in(&self, category: CategoryId) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, title, description, price, category_id
            FROM products
            WHERE category_id = $1
            ORDER BY title, id
            "#,
        )
        .bind(category.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn product(&self, id: ProductId) -> Result<Product> {
        sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, title, description, price, category_id
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .map(Product::from)
        .ok_or_else(|| ShopError::not_found("Product", id))
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, title, description, price, category_id
            FROM products
            WHERE id = ANY($1)
            ORDER BY title, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[async_trait]
impl ClientDirectory for PgStore {
    async fn upsert(&self, client: &Client) -> Result<bool> {
        // xmax is 0 only for a freshly inserted row
        let created = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO clients (id, first_name, last_name, username, is_premium)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                username = EXCLUDED.username,
                is_premium = EXCLUDED.is_premium
            RETURNING (xmax = 0)
            "#,
        )
        .bind(client.id)
        .bind(&client.first_name)
        .bind(&client.last_name)
        .bind(&client.username)
        .bind(client.is_premium)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn all(&self) -> Result<Vec<Client>> {
        let rows = sqlx::query_as::<_, ClientRow>(
            "SELECT id, first_name, last_name, username, is_premium FROM clients ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Client::from).collect())
    }
}

#[async_trait]
impl OrderLedger for PgStore {
    async fn append_payment(&self, records: &[OrderRecord]) -> Result<AppendOutcome> {
        let Some(first) = records.first() else {
            return Ok(AppendOutcome::Appended(0));
        };

        let mut tx = self.pool.begin().await?;

        // Single writer: concurrent confirmations queue here until commit
        sqlx::query("LOCK TABLE orders IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE charge_id = $1)",
        )
        .bind(&first.charge_id)
        .fetch_one(&mut *tx)
        .await?;
        if exists {
            tx.rollback().await?;
            return Ok(AppendOutcome::DuplicateCharge);
        }

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO orders (
                    charge_id, buyer_id, product_id, buyer_name, delivery_location,
                    product_title, quantity, amount, ordered_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(&record.charge_id)
            .bind(record.buyer_id)
            .bind(record.product_id.map(|id| id.0))
            .bind(&record.buyer_name)
            .bind(&record.delivery_location)
            .bind(&record.product_title)
            .bind(record.quantity.map(i64::from))
            .bind(record.amount)
            .bind(record.ordered_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(charge_id = %first.charge_id, rows = records.len(), "Inserted order rows");
        Ok(AppendOutcome::Appended(records.len()))
    }

    async fn records(&self) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT charge_id, buyer_id, product_id, buyer_name, delivery_location,
                   product_title, quantity, amount, ordered_at
            FROM orders
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(OrderRecord::from).collect())
    }
}
