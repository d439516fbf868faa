//! Order lifecycle error types.

use thiserror::Error;

use bubbling_bath_core::{OrderId, OrderStatus};

use crate::db::RepositoryError;
use crate::models::FieldError;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No order with this id.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// The request was malformed.
    #[error("validation failed: {0}")]
    Validation(#[from] FieldError),

    /// The order's current status does not allow this operation.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order kept changing underneath every retry.
    #[error("order {0} was modified concurrently, try again")]
    Conflict(OrderId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
