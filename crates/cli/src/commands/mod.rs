//! CLI subcommand implementations.

pub mod migrate;
pub mod password;
pub mod seed;
pub mod user;

use std::sync::Arc;

use bubbling_bath_storefront::config::StoreBackend;
use bubbling_bath_storefront::db::{self, DataStore, RepositoryError};

/// Open the store selected by the environment.
pub async fn open_store() -> Result<Arc<dyn DataStore>, RepositoryError> {
    dotenvy::dotenv().ok();
    let backend = StoreBackend::from_env();
    tracing::info!(backend = ?backend, "Opening data store...");
    db::open_store(&backend).await
}
