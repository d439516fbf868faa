//! Staff credential records.
//!
//! These are validated domain objects; the stores convert to and from their
//! own row or document shapes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bubbling_bath_core::{Email, Role};

/// A staff user in one credential pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Login identity. Compared case-insensitively.
    pub email: Email,
    /// Display name carried into the session.
    pub name: String,
    /// Tagged password hash, see `services::auth::password`.
    pub password_hash: String,
    /// Non-empty set of staff roles.
    pub roles: BTreeSet<Role>,
    /// When the user last signed in successfully.
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Why a credential record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserRecordError {
    #[error("a user needs at least one role")]
    NoRoles,
    #[error("role {0} cannot be given to staff")]
    NotStaffRole(Role),
    #[error("name cannot be empty")]
    EmptyName,
}

impl UserRecord {
    /// Build a record, enforcing the staff role invariants.
    ///
    /// # Errors
    ///
    /// Returns `UserRecordError` if the role set is empty, contains a
    /// non-staff role, or the name is blank.
    pub fn new(
        email: Email,
        name: impl Into<String>,
        password_hash: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<Self, UserRecordError> {
        let name = name.into().trim().to_owned();
        if name.is_empty() {
            return Err(UserRecordError::EmptyName);
        }

        let roles: BTreeSet<Role> = roles.into_iter().collect();
        if roles.is_empty() {
            return Err(UserRecordError::NoRoles);
        }
        if let Some(role) = roles.iter().find(|r| !r.is_staff()) {
            return Err(UserRecordError::NotStaffRole(*role));
        }

        Ok(Self {
            email,
            name,
            password_hash: password_hash.into(),
            roles,
            last_login_at: None,
        })
    }
}

/// Loyalty programme settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyConfig {
    /// Points earned per whole unit of currency spent.
    pub points_per_currency_unit: u32,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            points_per_currency_unit: 1,
        }
    }
}
