//! Domain models for the storefront.
//!
//! These are the records the data stores persist and the services operate on.
//! Request payloads that need validation live next to the record they build.

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::{
    Address, Customer, LineItem, LineItemInput, NewOrder, Order, Payment, PaymentInput, Shipping,
    TimelineEntry, ValidatedOrder,
};
pub use product::{LedgerEntry, Product, ProductInput, StockDelta};
pub use session::{Session, SessionClaims};
pub use user::{LoyaltyConfig, UserRecord};

/// A request payload failed validation on one field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}
