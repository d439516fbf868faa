//! Authentication service.
//!
//! Checks a staff password against the credential pool for the requested
//! workspace and, on success, returns the unsigned session claims.

mod error;
pub mod password;

pub use error::AuthError;

use tracing::{debug, instrument, warn};

use bubbling_bath_core::{Email, Workspace};

use crate::clock::Clock;
use crate::db::DataStore;
use crate::models::{SessionClaims, UserRecord};

use self::password::{hash_password, validate_password, verify_password};

/// Authentication service.
pub struct AuthService<'a> {
    store: &'a dyn DataStore,
    clock: &'a dyn Clock,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Verify `email`/`password` against the `workspace` credential pool.
    ///
    /// Returns `Ok(None)` for a malformed email, an unknown user and a wrong
    /// password alike. On success the user's last-login time is updated; a
    /// failure to persist it is logged and does not block the login.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the credential lookup itself fails.
    #[instrument(skip(self, password), fields(workspace = %workspace))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        workspace: Workspace,
    ) -> Result<Option<SessionClaims>, AuthError> {
        let Ok(email) = Email::parse(email) else {
            debug!("login rejected: malformed email");
            return Ok(None);
        };

        let Some(user) = self.store.find_user(&email, workspace).await? else {
            debug!("login rejected");
            return Ok(None);
        };

        if !verify_password(password, &user.password_hash) {
            debug!("login rejected");
            return Ok(None);
        }

        if let Err(e) = self
            .store
            .touch_last_login(&user.email, workspace, self.clock.now())
            .await
        {
            warn!(error = %e, "failed to record last login");
        }

        Ok(Some(SessionClaims {
            email: user.email,
            name: user.name,
            roles: user.roles,
            workspace,
        }))
    }

    /// Create or replace a staff user with an Argon2 password hash.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword` or
    /// `AuthError::InvalidUser` for bad input, and `AuthError::Repository` if the write fails.
    pub async fn provision_user(
        &self,
        workspace: Workspace,
        email: &str,
        name: &str,
        password: &str,
        roles: impl IntoIterator<Item = bubbling_bath_core::Role>,
    ) -> Result<UserRecord, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;
        let hash = hash_password(password)?;

        let user = UserRecord::new(email, name, hash, roles)?;
        self.store.upsert_user(workspace, user.clone()).await?;
        Ok(user)
    }
}
