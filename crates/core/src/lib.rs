//! Bubbling Bath Delights Core - Shared domain types.
//!
//! This crate provides the types shared by every Bubbling Bath Delights component:
//! - `storefront` - The HTTP service (shop, employee console, admin back office)
//! - `cli` - Command-line tools for migrations, seeding and user provisioning
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails, money, roles and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
