//! Staff user management.
//!
//! # Usage
//!
//! ```bash
//! bb-cli user create --pool admin -e owner@bubblingbath.test -n "Owner" -r admin -p '...'
//! bb-cli user create --pool employee -e sam@bubblingbath.test -n "Sam" -r employee
//! ```
//!
//! When `--password` is omitted the password is read from
//! `BBD_NEW_USER_PASSWORD`.

use bubbling_bath_core::{Role, Workspace};
use bubbling_bath_storefront::clock::SystemClock;
use bubbling_bath_storefront::services::auth::{AuthError, AuthService};
use thiserror::Error;

use super::open_store;

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid role: {0}. Valid roles: admin, employee")]
    InvalidRole(String),

    #[error("Invalid pool: {0}. Valid pools: admin, employee")]
    InvalidPool(String),

    #[error(transparent)]
    Store(#[from] bubbling_bath_storefront::db::RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Parse a comma-separated role list.
///
/// # Errors
///
/// Returns `UserError::InvalidRole` for the first unknown role.
pub fn parse_roles(roles: &str) -> Result<Vec<Role>, UserError> {
    roles
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| r.parse().map_err(|_| UserError::InvalidRole(r.to_owned())))
        .collect()
}

/// Create or replace a staff user.
///
/// # Errors
///
/// Returns an error for an unknown pool or role, a weak password or a store
/// failure.
pub async fn create(
    pool: &str,
    email: &str,
    name: &str,
    roles: &str,
    password: Option<String>,
) -> Result<(), UserError> {
    let workspace: Workspace = pool
        .parse()
        .map_err(|_| UserError::InvalidPool(pool.to_owned()))?;
    let roles = parse_roles(roles)?;
    let password = password
        .or_else(|| std::env::var("BBD_NEW_USER_PASSWORD").ok())
        .ok_or(UserError::MissingEnvVar("BBD_NEW_USER_PASSWORD"))?;

    let store = open_store().await?;
    let user = AuthService::new(store.as_ref(), &SystemClock)
        .provision_user(workspace, email, name, &password, roles)
        .await?;

    tracing::info!(
        email = %user.email,
        pool = %workspace,
        roles = ?user.roles,
        "Staff user saved"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        assert_eq!(
            parse_roles("admin, Employee").unwrap(),
            vec![Role::Admin, Role::Employee]
        );
        assert!(matches!(
            parse_roles("admin,wizard"),
            Err(UserError::InvalidRole(r)) if r == "wizard"
        ));
    }
}
