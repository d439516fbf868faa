//! Roles and workspaces.
//!
//! A [`Role`] is what a user is allowed to do; a [`Workspace`] is which
//! credential pool they signed in through. Staff records only ever carry
//! `admin` and `employee`; `customer` exists so route allow-lists and the
//! role cookie can name the shop workspace.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a role or workspace string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct RoleParseError(pub String);

/// Closed set of roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Back-office access, implicitly allowed everywhere.
    Admin,
    /// Fulfilment console access.
    Employee,
    /// Shop account access.
    Customer,
}

impl Role {
    /// All roles, in declaration order.
    pub const ALL: [Self; 3] = [Self::Admin, Self::Employee, Self::Customer];

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
            Self::Customer => "customer",
        }
    }

    /// Whether a staff credential record may carry this role.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Admin | Self::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    /// Parses case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RoleParseError(trimmed.to_owned()))
    }
}

/// Workspace a session was opened for, which is also the credential pool
/// the user was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workspace {
    Admin,
    Employee,
}

impl Workspace {
    /// Wire name of the workspace.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
        }
    }

    /// Landing page after a successful login.
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Employee => "/employee",
        }
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Workspace {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "employee" => Ok(Self::Employee),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}
