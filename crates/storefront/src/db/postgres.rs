//! `PostgreSQL` store.
//!
//! Queries are built at runtime so the crate compiles without a live
//! database. Every commit runs in one transaction; stock rows are locked with
//! `SELECT ... FOR UPDATE` in product-id order before they are changed.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use bubbling_bath_core::{Email, Money, OrderId, ProductId, Role, Season, Workspace};

use super::{CredentialStore, DataStore, OrderStore, ProductStore, RepositoryError};
use crate::models::product::clamp_stock;
use crate::models::{
    LedgerEntry, LoyaltyConfig, Order, Product, ProductInput, StockDelta, UserRecord,
};

/// `PostgreSQL`-backed [`DataStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// =============================================================================
// Row types
// =============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    email: String,
    name: String,
    password_hash: String,
    roles: Vec<String>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let roles = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid role in database: {e}")))?;

        Ok(Self {
            email,
            name: row.name,
            password_hash: row.password_hash,
            roles,
            last_login_at: row.last_login_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    sku: Option<String>,
    price: Decimal,
    inventory: i32,
    category: String,
    season: String,
    description: String,
    short_description: Option<String>,
    tags: Vec<String>,
    rating: f64,
    review_count: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| {
            RepositoryError::DataCorruption(format!("invalid {what} for product {}", row.id))
        };

        Ok(Self {
            price: Money::new(row.price).map_err(|_| corrupt("price"))?,
            inventory: u32::try_from(row.inventory).map_err(|_| corrupt("inventory"))?,
            season: row.season.parse::<Season>().map_err(|_| corrupt("season"))?,
            review_count: u32::try_from(row.review_count).map_err(|_| corrupt("review_count"))?,
            id: ProductId::new(row.id),
            name: row.name,
            sku: row.sku,
            category: row.category,
            description: row.description,
            short_description: row.short_description,
            tags: row.tags,
            rating: row.rating,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    version: i64,
    document: Json<Order>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let mut order = row.document.0;
        order.version = u64::try_from(row.version).map_err(|_| {
            RepositoryError::DataCorruption(format!("negative version for order {}", order.id))
        })?;
        Ok(order)
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    product_id: String,
    requested: i64,
    applied: i64,
    stock_before: i32,
    stock_after: i32,
    reason: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = RepositoryError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let stock = |v: i32| {
            u32::try_from(v).map_err(|_| {
                RepositoryError::DataCorruption(format!(
                    "negative stock in ledger for {}",
                    row.product_id
                ))
            })
        };

        Ok(Self {
            stock_before: stock(row.stock_before)?,
            stock_after: stock(row.stock_after)?,
            product_id: ProductId::new(row.product_id),
            requested: row.requested,
            applied: row.applied,
            reason: row.reason,
            recorded_at: row.recorded_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, sku, price, inventory, category, season, description, \
     short_description, tags, rating, review_count, created_at";

fn to_i32(value: u32, what: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Conflict(format!("{what} out of range")))
}

fn to_i64(value: u64, what: &str) -> Result<i64, RepositoryError> {
    i64::try_from(value).map_err(|_| RepositoryError::Conflict(format!("{what} out of range")))
}

fn map_unique_violation(e: sqlx::Error, message: impl FnOnce() -> String) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message());
    }
    RepositoryError::Database(e)
}

/// Apply stock deltas inside an open transaction.
async fn apply_deltas_tx(
    tx: &mut Transaction<'_, Postgres>,
    deltas: &[StockDelta],
    at: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>, RepositoryError> {
    // Lock rows in a stable order so two commits cannot deadlock.
    let mut ordered: Vec<&StockDelta> = deltas.iter().collect();
    ordered.sort_by(|a, b| a.product_id.cmp(&b.product_id));

    let mut entries = Vec::with_capacity(ordered.len());
    for delta in ordered {
        let current: Option<i32> =
            sqlx::query_scalar("SELECT inventory FROM products WHERE id = $1 FOR UPDATE")
                .bind(delta.product_id.as_str())
                .fetch_optional(&mut **tx)
                .await?;

        let Some(current) = current else {
            continue;
        };

        let before = u32::try_from(current).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative inventory for product {}",
                delta.product_id
            ))
        })?;
        let after = clamp_stock(before, delta.delta);

        sqlx::query("UPDATE products SET inventory = $1 WHERE id = $2")
            .bind(to_i32(after, "inventory")?)
            .bind(delta.product_id.as_str())
            .execute(&mut **tx)
            .await?;

        let entry = LedgerEntry {
            product_id: delta.product_id.clone(),
            requested: delta.delta,
            applied: i64::from(after) - i64::from(before),
            stock_before: before,
            stock_after: after,
            reason: delta.reason.clone(),
            recorded_at: at,
        };

        sqlx::query(
            r"
            INSERT INTO inventory_ledger
                (product_id, requested, applied, stock_before, stock_after, reason, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(entry.product_id.as_str())
        .bind(entry.requested)
        .bind(entry.applied)
        .bind(to_i32(entry.stock_before, "inventory")?)
        .bind(to_i32(entry.stock_after, "inventory")?)
        .bind(&entry.reason)
        .bind(entry.recorded_at)
        .execute(&mut **tx)
        .await?;

        entries.push(entry);
    }

    Ok(entries)
}

/// Version-checked order update inside an open transaction.
async fn replace_order_tx(
    tx: &mut Transaction<'_, Postgres>,
    mut order: Order,
    expected_version: u64,
) -> Result<Order, RepositoryError> {
    order.version = expected_version + 1;

    let result = sqlx::query(
        r"
        UPDATE orders
        SET status = $1, version = $2, document = $3, updated_at = $4
        WHERE id = $5 AND version = $6
        ",
    )
    .bind(order.status.as_str())
    .bind(to_i64(order.version, "version")?)
    .bind(Json(&order))
    .bind(order.updated_at)
    .bind(order.id.as_str())
    .bind(to_i64(expected_version, "version")?)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(order.id.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        return Err(match exists {
            Some(found) => RepositoryError::Conflict(format!(
                "order {} is at version {found}, expected {expected_version}",
                order.id
            )),
            None => RepositoryError::NotFound,
        });
    }

    Ok(order)
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_user(
        &self,
        email: &Email,
        pool: Workspace,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT email, name, password_hash, roles, last_login_at
            FROM users
            WHERE pool = $1 AND lower(email) = lower($2)
            ",
        )
        .bind(pool.as_str())
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }

    async fn touch_last_login(
        &self,
        email: &Email,
        pool: Workspace,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET last_login_at = $1 WHERE pool = $2 AND lower(email) = lower($3)",
        )
        .bind(at)
        .bind(pool.as_str())
        .bind(email.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn upsert_user(&self, pool: Workspace, user: UserRecord) -> Result<(), RepositoryError> {
        let roles: Vec<&str> = user.roles.iter().map(|r| r.as_str()).collect();

        sqlx::query(
            r"
            INSERT INTO users (pool, email, name, password_hash, roles, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (pool, (lower(email))) DO UPDATE
            SET email = EXCLUDED.email,
                name = EXCLUDED.name,
                password_hash = EXCLUDED.password_hash,
                roles = EXCLUDED.roles
            ",
        )
        .bind(pool.as_str())
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(&roles)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn loyalty_config(&self) -> Result<LoyaltyConfig, RepositoryError> {
        let points: Option<i32> =
            sqlx::query_scalar("SELECT points_per_currency_unit FROM loyalty_config LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;

        match points {
            Some(p) => Ok(LoyaltyConfig {
                points_per_currency_unit: u32::try_from(p).map_err(|_| {
                    RepositoryError::DataCorruption("negative loyalty rate".to_owned())
                })?,
            }),
            None => Ok(LoyaltyConfig::default()),
        }
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn insert_product(&self, product: Product) -> Result<Product, RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO products ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price.amount())
        .bind(to_i32(product.inventory, "inventory")?)
        .bind(&product.category)
        .bind(product.season.as_str())
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(&product.tags)
        .bind(product.rating)
        .bind(to_i32(product.review_count, "review_count")?)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || format!("product {} already exists", product.id)))?;

        Ok(product)
    }

    async fn update_product(
        &self,
        id: &ProductId,
        input: ProductInput,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let product = input.into_replacement(&Product::try_from(row)?)?;

        sqlx::query(
            r"
            UPDATE products
            SET name = $2, sku = $3, price = $4, inventory = $5, category = $6, season = $7,
                description = $8, short_description = $9, tags = $10, rating = $11,
                review_count = $12
            WHERE id = $1
            ",
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price.amount())
        .bind(to_i32(product.inventory, "inventory")?)
        .bind(&product.category)
        .bind(product.season.as_str())
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(&product.tags)
        .bind(product.rating)
        .bind(to_i32(product.review_count, "review_count")?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, deltas), fields(count = deltas.len()))]
    async fn apply_stock_deltas(
        &self,
        deltas: &[StockDelta],
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let entries = apply_deltas_tx(&mut tx, deltas, at).await?;
        tx.commit().await?;
        Ok(entries)
    }

    async fn stock_history(&self, id: &ProductId) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r"
            SELECT product_id, requested, applied, stock_before, stock_after, reason, recorded_at
            FROM inventory_ledger
            WHERE product_id = $1
            ORDER BY recorded_at, id
            ",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT version, document FROM orders ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row =
            sqlx::query_as::<_, OrderRow>("SELECT version, document FROM orders WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    async fn insert_order(&self, mut order: Order) -> Result<Order, RepositoryError> {
        order.version = 1;

        sqlx::query(
            r"
            INSERT INTO orders (id, status, version, document, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order.id.as_str())
        .bind(order.status.as_str())
        .bind(1_i64)
        .bind(Json(&order))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, || format!("order {} already exists", order.id)))?;

        Ok(order)
    }

    async fn save_order(
        &self,
        order: Order,
        expected_version: u64,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let saved = replace_order_tx(&mut tx, order, expected_version).await?;
        tx.commit().await?;
        Ok(saved)
    }

    #[instrument(skip(self, order, deltas), fields(order_id = %order.id))]
    async fn save_order_with_stock(
        &self,
        order: Order,
        expected_version: u64,
        deltas: &[StockDelta],
        at: DateTime<Utc>,
    ) -> Result<(Order, Vec<LedgerEntry>), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        // Dropping the transaction on error rolls back both writes.
        let saved = replace_order_tx(&mut tx, order, expected_version).await?;
        let entries = apply_deltas_tx(&mut tx, deltas, at).await?;
        tx.commit().await?;
        Ok((saved, entries))
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
