//! Seed the store with staff users and catalog products from a YAML file.
//!
//! ```yaml
//! users:
//!   - pool: admin
//!     email: owner@bubblingbath.test
//!     name: Owner
//!     password: change-me-please
//!     roles: [admin]
//! products:
//!   - name: Lavender Dreams
//!     sku: BB-LAV-001
//!     price: "8.50"
//!     inventory: 40
//!     category: bath-bombs
//!     season: spring
//! ```
//!
//! Seeding is repeatable: users are upserted and products whose id already
//! exists are skipped.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use bubbling_bath_core::{Role, Workspace};
use bubbling_bath_storefront::clock::{Clock, SystemClock};
use bubbling_bath_storefront::db::{DataStore, RepositoryError};
use bubbling_bath_storefront::models::ProductInput;
use bubbling_bath_storefront::services::auth::AuthService;

use super::open_store;

/// A staff user in the seed file.
#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub pool: Workspace,
    pub email: String,
    pub name: String,
    pub password: String,
    pub roles: Vec<Role>,
}

/// Seed file layout.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub products: Vec<ProductInput>,
}

/// What a seeding run did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub products_inserted: usize,
    pub products_skipped: usize,
    pub errors: Vec<String>,
}

/// Parse a seed file.
///
/// # Errors
///
/// Returns the YAML error for malformed input.
pub fn parse(content: &str) -> Result<SeedFile, serde_yaml::Error> {
    serde_yaml::from_str(content)
}

/// Apply a parsed seed file to `store`.
///
/// Bad entries are collected in the summary rather than aborting the run.
pub async fn apply(store: &dyn DataStore, clock: &dyn Clock, seed: SeedFile) -> SeedSummary {
    let mut summary = SeedSummary::default();
    let auth = AuthService::new(store, clock);

    for user in seed.users {
        match auth
            .provision_user(user.pool, &user.email, &user.name, &user.password, user.roles)
            .await
        {
            Ok(_) => summary.users += 1,
            Err(e) => summary.errors.push(format!("user {}: {e}", user.email)),
        }
    }

    for input in seed.products {
        let name = input.name.clone();
        let product = match input.into_new_product(clock.now()) {
            Ok(product) => product,
            Err(e) => {
                summary.errors.push(format!("product {name}: {e}"));
                continue;
            }
        };

        match store.insert_product(product).await {
            Ok(_) => summary.products_inserted += 1,
            Err(RepositoryError::Conflict(_)) => summary.products_skipped += 1,
            Err(e) => summary.errors.push(format!("product {name}: {e}")),
        }
    }

    summary
}

/// Seed the configured store from `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, the store cannot be
/// opened, or any entry failed.
pub async fn run(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse(&content)?;
    info!(
        users = seed.users.len(),
        products = seed.products.len(),
        "Parsed seed file"
    );

    let store = open_store().await?;
    let summary = apply(store.as_ref(), &SystemClock, seed).await;

    info!("Seeding complete!");
    info!("  Users saved: {}", summary.users);
    info!("  Products inserted: {}", summary.products_inserted);
    if summary.products_skipped > 0 {
        warn!("  Products skipped (already exist): {}", summary.products_skipped);
    }

    if !summary.errors.is_empty() {
        error!("  Errors: {}", summary.errors.len());
        for err in &summary.errors {
            error!("    - {err}");
        }
        return Err(format!("{} seed entries failed", summary.errors.len()).into());
    }

    Ok(())
}
