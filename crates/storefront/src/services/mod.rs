//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Staff authentication against the per-workspace credential pools
//! - `session_codec` - Signed, expiring session tokens
//! - `orders` - Order lifecycle (create, approve, deny, advance, refund)
//! - `inventory` - Stock adjustments and the inventory ledger
//! - `labels` - Shipping label identifiers
//! - `notify` - Customer notifications

pub mod auth;
pub mod inventory;
pub mod labels;
pub mod notify;
pub mod orders;
pub mod session_codec;
