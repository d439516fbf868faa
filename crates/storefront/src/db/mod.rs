//! Persistence for credentials, products, orders and the stock ledger.
//!
//! The services talk to a [`DataStore`], which is the union of three narrow
//! store traits. Two backends implement it:
//!
//! - [`json::JsonStore`] - one flat JSON document on disk (default)
//! - [`postgres::PgStore`] - `PostgreSQL` through `sqlx`
//!
//! Both backends treat a single commit (an order write plus any stock
//! deltas) as all-or-nothing, and both reject an order write whose expected
//! version does not match what is persisted.
//!
//! # Migrations
//!
//! `PostgreSQL` migrations are stored in `crates/storefront/migrations/` and
//! run via:
//! ```bash
//! cargo run -p bubbling-bath-cli -- migrate
//! ```

pub mod json;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use bubbling_bath_core::{Email, OrderId, ProductId, Workspace};

use crate::config::StoreBackend;
use crate::models::{
    FieldError, LedgerEntry, LoyaltyConfig, Order, Product, ProductInput, StockDelta, UserRecord,
};

pub use json::JsonStore;
pub use postgres::PgStore;

/// Errors that can occur in store operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Reading or writing the document store failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The document store could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted data is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Duplicate key or a stale version.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An edit built from the stored record failed validation.
    #[error("invalid: {0}")]
    Invalid(#[from] FieldError),
}

/// Staff credential pools and loyalty settings.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a user by email (case-insensitive) in one pool.
    async fn find_user(
        &self,
        email: &Email,
        pool: Workspace,
    ) -> Result<Option<UserRecord>, RepositoryError>;

    /// Record a successful sign-in.
    async fn touch_last_login(
        &self,
        email: &Email,
        pool: Workspace,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Insert a user, or replace the one with the same email in that pool.
    async fn upsert_user(&self, pool: Workspace, user: UserRecord) -> Result<(), RepositoryError>;

    async fn loyalty_config(&self) -> Result<LoyaltyConfig, RepositoryError>;
}

/// Catalog and stock.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Fails with `Conflict` if the id is taken.
    async fn insert_product(&self, product: Product) -> Result<Product, RepositoryError>;

    /// Replace a product's details from `input`.
    ///
    /// The current row is re-read in the same write, so stock that `input`
    /// leaves unset is whatever is persisted at that moment. Fails with
    /// `NotFound` if the product does not exist and `Invalid` if `input`
    /// does not validate.
    async fn update_product(
        &self,
        id: &ProductId,
        input: ProductInput,
    ) -> Result<Product, RepositoryError>;

    /// Fails with `NotFound` if the product does not exist.
    async fn delete_product(&self, id: &ProductId) -> Result<(), RepositoryError>;

    /// Apply every delta in one write, clamping each product at zero stock.
    ///
    /// Deltas for unknown products are skipped; the returned entries cover
    /// only the products that were changed.
    async fn apply_stock_deltas(
        &self,
        deltas: &[StockDelta],
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;

    /// Ledger entries for one product, oldest first.
    async fn stock_history(&self, id: &ProductId) -> Result<Vec<LedgerEntry>, RepositoryError>;
}

/// Orders with optimistic concurrency.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Persist a new order at version 1. Fails with `Conflict` if the id is taken.
    async fn insert_order(&self, order: Order) -> Result<Order, RepositoryError>;

    /// Overwrite an order if its persisted version is `expected_version`.
    ///
    /// The stored copy gets `expected_version + 1`. Fails with `Conflict` on a
    /// version mismatch and `NotFound` if the order is gone.
    async fn save_order(&self, order: Order, expected_version: u64)
    -> Result<Order, RepositoryError>;

    /// Like [`OrderStore::save_order`], and apply `deltas` in the same commit.
    ///
    /// Nothing is applied when the version check fails.
    async fn save_order_with_stock(
        &self,
        order: Order,
        expected_version: u64,
        deltas: &[StockDelta],
        at: DateTime<Utc>,
    ) -> Result<(Order, Vec<LedgerEntry>), RepositoryError>;
}

/// Everything the storefront persists.
#[async_trait]
pub trait DataStore: CredentialStore + ProductStore + OrderStore {
    /// Cheap readiness probe.
    async fn health_check(&self) -> Result<(), RepositoryError>;
}

/// Open the configured backend.
///
/// # Errors
///
/// Returns `RepositoryError` if the database cannot be reached or the
/// document store cannot be read.
pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn DataStore>, RepositoryError> {
    match backend {
        StoreBackend::Json { path } => {
            let store = JsonStore::open(path).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Postgres { url } => {
            let pool = create_pool(url).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
