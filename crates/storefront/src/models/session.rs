//! Session types.
//!
//! A [`SessionClaims`] is what the authenticator hands back after a password
//! check; stamping it with an issue time turns it into a [`Session`], which is
//! what the session codec signs into the cookie.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use bubbling_bath_core::{Email, Role, Workspace};

/// Unsigned identity produced by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: Email,
    pub name: String,
    pub roles: BTreeSet<Role>,
    pub workspace: Workspace,
}

impl SessionClaims {
    /// Stamp the claims with an issue time (seconds since epoch).
    #[must_use]
    pub fn issue(self, issued_at: i64) -> Session {
        Session {
            email: self.email,
            name: self.name,
            roles: self.roles,
            workspace: self.workspace,
            issued_at,
        }
    }
}

/// A signed-in identity as carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub email: Email,
    pub name: String,
    pub roles: BTreeSet<Role>,
    pub workspace: Workspace,
    /// Seconds since the Unix epoch.
    #[serde(rename = "iat")]
    pub issued_at: i64,
}

impl Session {
    /// Whether the session holds at least one of `allowed`.
    #[must_use]
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.iter().any(|role| self.roles.contains(role))
    }
}
