//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! bb-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `BBD_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/storefront/migrations/`. The JSON store needs
//! none.

use secrecy::SecretString;
use thiserror::Error;

use bubbling_bath_storefront::db::create_pool;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the storefront migrations.
///
/// # Errors
///
/// Returns an error if no database URL is set, the database is unreachable
/// or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BBD_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("BBD_DATABASE_URL"))?;

    tracing::info!("Connecting to storefront database...");
    let pool = create_pool(&database_url).await?;

    tracing::info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}
