//! Staff and customer email addresses.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Why a string was rejected as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("email cannot be empty")]
    Empty,

    #[error("email must be at most {} characters", Email::MAX_LENGTH)]
    TooLong,

    #[error("email cannot contain whitespace")]
    Whitespace,

    /// Not exactly one `@` with text on both sides.
    #[error("email must look like name@domain")]
    NotAnAddress,

    /// The domain has no dot, or starts or ends with one.
    #[error("email domain `{0}` is not a valid domain")]
    BadDomain(String),
}

/// An email address that identifies a staff member or a customer.
///
/// Input is trimmed. The casing the address was entered with is kept for
/// display, but equality and hashing ignore ASCII case, so
/// `Maya@BubblingBath.test` and `maya@bubblingbath.test` are the same
/// account everywhere an `Email` is compared.
///
/// ```
/// use bubbling_bath_core::Email;
///
/// let typed = Email::parse("  Maya@BubblingBath.test ").unwrap();
/// assert_eq!(typed.as_str(), "Maya@BubblingBath.test");
/// assert_eq!(typed, Email::parse("maya@bubblingbath.test").unwrap());
///
/// assert!(Email::parse("maya@localhost").is_err());
/// assert!(Email::parse("maya@@bubblingbath.test").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Longest address accepted (RFC 5321 path limit).
    pub const MAX_LENGTH: usize = 254;

    /// Parse and validate an address.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] the input trips.
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EmailError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(EmailError::Whitespace);
        }

        let (local, domain) = s.split_once('@').ok_or(EmailError::NotAnAddress)?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(EmailError::NotAnAddress);
        }
        if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
            return Err(EmailError::BadDomain(domain.to_owned()));
        }

        Ok(Self(s.to_owned()))
    }

    /// The address as entered, trimmed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Email {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Email {}

impl Hash for Email {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Email {
    type Error = EmailError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_accepts_staff_and_customer_addresses() {
        for ok in [
            "owner@bubblingbath.test",
            "jo.bather+gifts@example.co.uk",
            "a@b.c",
        ] {
            assert!(Email::parse(ok).is_ok(), "{ok}");
        }
    }

    #[test]
    fn test_rejections_name_the_problem() {
        assert_eq!(Email::parse("   "), Err(EmailError::Empty));
        assert_eq!(
            Email::parse(&format!("{}@example.test", "a".repeat(250))),
            Err(EmailError::TooLong)
        );
        assert_eq!(Email::parse("jo bather@example.test"), Err(EmailError::Whitespace));
        assert_eq!(Email::parse("jo.example.test"), Err(EmailError::NotAnAddress));
        assert_eq!(Email::parse("@example.test"), Err(EmailError::NotAnAddress));
        assert_eq!(Email::parse("jo@"), Err(EmailError::NotAnAddress));
        assert_eq!(Email::parse("jo@a@example.test"), Err(EmailError::NotAnAddress));
        assert_eq!(
            Email::parse("jo@localhost"),
            Err(EmailError::BadDomain("localhost".to_owned()))
        );
        assert!(matches!(Email::parse("jo@example."), Err(EmailError::BadDomain(_))));
    }

    #[test]
    fn test_identity_ignores_case_but_display_keeps_it() {
        let typed = Email::parse(" Admin@BubblingBath.test").unwrap();
        let stored = Email::parse("admin@bubblingbath.test").unwrap();

        assert_eq!(typed, stored);
        assert_eq!(typed.to_string(), "Admin@BubblingBath.test");

        let set: HashSet<Email> = [typed, stored].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_deserialize_validates() {
        let email: Email = serde_json::from_str("\"Jo@Example.test\"").unwrap();
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"Jo@Example.test\"");

        assert!(serde_json::from_str::<Email>("\"not-an-email\"").is_err());
    }
}
