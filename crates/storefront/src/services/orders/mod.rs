//! Order lifecycle engine.
//!
//! ```text
//! pending ──approve──▶ approved ──advance──▶ processing / ready / shipped / completed
//!    │                    │                              │
//!    └──deny──▶ denied    └───────────refund─────────────┴──▶ refunded
//! ```
//!
//! Every change is a read-modify-write against the order's version. A commit
//! that loses a race is retried from a fresh read, so a second concurrent
//! `approve` sees the order already approved and does nothing. Approval and
//! refund move stock in the same commit as the status change.

mod error;

pub use error::OrderError;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, instrument, warn};

use bubbling_bath_core::{OrderId, OrderStatus, PaymentStatus};

use crate::clock::Clock;
use crate::db::{DataStore, RepositoryError};
use crate::models::{FieldError, NewOrder, Order, Payment, StockDelta};
use crate::services::inventory::{self, InventoryLedger};
use crate::services::labels::shipping_label;
use crate::services::notify::{Notification, Notifier, dispatch};

/// How many times a commit is retried after losing a version race.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Timeline note for new orders.
pub const RECEIVED_NOTE: &str = "received via storefront";

/// Outcome of applying an operation to the current order.
enum Step {
    /// Nothing to write; the operation was already in effect.
    Unchanged(Order),
    /// Write the order, moving stock by `deltas` in the same commit.
    Save { order: Order, deltas: Vec<StockDelta> },
}

struct Committed {
    order: Order,
    changed: bool,
}

/// Order lifecycle operations.
pub struct OrderService<'a> {
    store: &'a dyn DataStore,
    clock: &'a dyn Clock,
    notifier: Arc<dyn Notifier>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub fn new(store: &'a dyn DataStore, clock: &'a dyn Clock, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            clock,
            notifier,
        }
    }

    /// Place a new order in `pending`.
    ///
    /// Line prices are taken from the request. The discount is capped at the
    /// subtotal, and loyalty points are `floor(total)` times the configured
    /// rate.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for an empty item list, a quantity
    /// below one or a negative price or discount.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: NewOrder) -> Result<Order, OrderError> {
        let valid = input.validate()?;
        let loyalty = self.store.loyalty_config().await?;
        let now = self.clock.now();

        let loyalty_points = valid
            .total
            .amount()
            .floor()
            .to_u64()
            .unwrap_or(0)
            .saturating_mul(u64::from(loyalty.points_per_currency_unit));

        let mut order = Order {
            id: OrderId::generate(),
            status: OrderStatus::Pending,
            customer: valid.customer,
            items: valid.items,
            subtotal: valid.subtotal,
            discount: valid.discount,
            total: valid.total,
            payment: Payment {
                method: valid.payment.method,
                last4: valid.payment.last4,
                status: PaymentStatus::Authorized,
            },
            shipping: valid.shipping,
            label: None,
            denial_reason: None,
            loyalty_points,
            timeline: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        order.record_status(OrderStatus::Pending, Some(RECEIVED_NOTE.to_owned()), now);

        let order = self.store.insert_order(order).await?;
        info!(order_id = %order.id, total = %order.total, "order created");

        self.notify(
            &order,
            format!("We received order {}", order.id),
            format!("Thanks {}! Your order total is {}.", order.customer.name, order.total),
        );
        Ok(order)
    }

    /// Approve a pending order.
    ///
    /// Generates the shipping label, takes stock for every line, captures
    /// payment and moves the order to `approved`, all in one commit. An order
    /// that is already approved (or further along in fulfilment) is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id and
    /// `OrderError::InvalidTransition` for a denied or refunded order.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn approve(&self, id: &OrderId) -> Result<Order, OrderError> {
        let committed = self
            .commit(id, |mut order, now| {
                if order.status.is_past_approval() {
                    return Ok(Step::Unchanged(order));
                }
                if order.status != OrderStatus::Pending {
                    return Err(OrderError::InvalidTransition {
                        from: order.status,
                        to: OrderStatus::Approved,
                    });
                }

                let address = &order.shipping.address;
                let label = shipping_label(&address.postal_code, &address.city, now);
                let deltas = InventoryLedger::decrement_deltas(
                    &order.items,
                    &format!("order {} approved", order.id),
                );

                order.payment.status = PaymentStatus::Captured;
                order.label = Some(label.clone());
                order.record_status(OrderStatus::Approved, Some(format!("label {label}")), now);
                Ok(Step::Save { order, deltas })
            })
            .await?;

        if committed.changed {
            let order = &committed.order;
            info!(status = %order.status, label = ?order.label, "order approved");
            self.notify(
                order,
                format!("Order {} approved", order.id),
                "Your order has been approved and is being prepared.".to_owned(),
            );
        } else {
            debug!("approve ignored: order already approved");
        }
        Ok(committed.order)
    }

    /// Deny a pending order with a reason.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Validation` for a blank reason,
    /// `OrderError::NotFound` for an unknown id and
    /// `OrderError::InvalidTransition` if the order is past approval.
    #[instrument(skip(self, reason), fields(order_id = %id))]
    pub async fn deny(&self, id: &OrderId, reason: &str) -> Result<Order, OrderError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FieldError::new("reason", "a reason is required to deny an order").into());
        }

        let committed = self
            .commit(id, |mut order, now| match order.status {
                OrderStatus::Denied => Ok(Step::Unchanged(order)),
                OrderStatus::Pending => {
                    order.payment.status = PaymentStatus::Refunded;
                    order.denial_reason = Some(reason.to_owned());
                    order.record_status(OrderStatus::Denied, Some(reason.to_owned()), now);
                    Ok(Step::Save {
                        order,
                        deltas: Vec::new(),
                    })
                }
                from => Err(OrderError::InvalidTransition {
                    from,
                    to: OrderStatus::Denied,
                }),
            })
            .await?;

        if committed.changed {
            let order = &committed.order;
            info!(status = %order.status, "order denied");
            self.notify(
                order,
                format!("Order {} could not be fulfilled", order.id),
                format!("Your payment has been refunded. Reason: {reason}"),
            );
        }
        Ok(committed.order)
    }

    /// Set a fulfilment status and append a timeline entry.
    ///
    /// Any current status is accepted. The target must be one of the
    /// fulfilment statuses; approval, denial and refund have their own
    /// operations because they carry side effects.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidTransition` for a non-fulfilment target
    /// and `OrderError::NotFound` for an unknown id.
    #[instrument(skip(self, note), fields(order_id = %id, to = %status))]
    pub async fn advance_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
        note: Option<&str>,
    ) -> Result<Order, OrderError> {
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned);

        let committed = self
            .commit(id, |mut order, now| {
                if !status.is_fulfilment() {
                    return Err(OrderError::InvalidTransition {
                        from: order.status,
                        to: status,
                    });
                }
                if !order.status.is_past_approval() {
                    warn!(from = %order.status, "advancing an order that was never approved");
                }
                order.record_status(status, note.clone(), now);
                Ok(Step::Save {
                    order,
                    deltas: Vec::new(),
                })
            })
            .await?;

        let order = &committed.order;
        info!(status = %order.status, "order status advanced");
        self.notify(
            order,
            format!("Order {} is now {}", order.id, order.status),
            note.unwrap_or_else(|| format!("Your order status changed to {}.", order.status)),
        );
        Ok(committed.order)
    }

    /// Refund an approved order and return its stock.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id and
    /// `OrderError::InvalidTransition` for a pending or denied order.
    #[instrument(skip(self, note), fields(order_id = %id))]
    pub async fn refund(&self, id: &OrderId, note: Option<&str>) -> Result<Order, OrderError> {
        let note = note.map(str::trim).filter(|n| !n.is_empty()).map(str::to_owned);

        let committed = self
            .commit(id, |mut order, now| {
                if order.status == OrderStatus::Refunded {
                    return Ok(Step::Unchanged(order));
                }
                if !order.status.is_past_approval() {
                    return Err(OrderError::InvalidTransition {
                        from: order.status,
                        to: OrderStatus::Refunded,
                    });
                }

                let deltas = InventoryLedger::restock_deltas(
                    &order.items,
                    &format!("order {} refunded", order.id),
                );
                order.payment.status = PaymentStatus::Refunded;
                order.record_status(OrderStatus::Refunded, note.clone(), now);
                Ok(Step::Save { order, deltas })
            })
            .await?;

        if committed.changed {
            let order = &committed.order;
            info!(status = %order.status, "order refunded");
            self.notify(
                order,
                format!("Order {} refunded", order.id),
                format!("A refund of {} is on its way.", order.total),
            );
        }
        Ok(committed.order)
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown id.
    pub async fn get(&self, id: &OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound(id.clone()))
    }

    /// All orders, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store cannot be read.
    pub async fn list(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, OrderError> {
        let orders = self.store.list_orders().await?;
        Ok(match status {
            Some(status) => orders.into_iter().filter(|o| o.status == status).collect(),
            None => orders,
        })
    }

    /// Orders staff still have to work on: approved or in fulfilment.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the store cannot be read.
    pub async fn fulfilment_queue(&self) -> Result<Vec<Order>, OrderError> {
        let orders = self.store.list_orders().await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.status.is_past_approval() && o.status != OrderStatus::Completed)
            .collect())
    }

    /// Apply `step` to the current order and persist the result, retrying
    /// from a fresh read when another writer got there first.
    async fn commit<F>(&self, id: &OrderId, mut step: F) -> Result<Committed, OrderError>
    where
        F: FnMut(Order, DateTime<Utc>) -> Result<Step, OrderError> + Send,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self
                .store
                .get_order(id)
                .await?
                .ok_or_else(|| OrderError::NotFound(id.clone()))?;
            let expected_version = current.version;
            let now = self.clock.now();

            let (order, deltas) = match step(current, now)? {
                Step::Unchanged(order) => {
                    return Ok(Committed {
                        order,
                        changed: false,
                    });
                }
                Step::Save { order, deltas } => (order, deltas),
            };

            let result = if deltas.is_empty() {
                self.store
                    .save_order(order, expected_version)
                    .await
                    .map(|order| (order, Vec::new()))
            } else {
                self.store
                    .save_order_with_stock(order, expected_version, &deltas, now)
                    .await
            };

            match result {
                Ok((order, ledger)) => {
                    inventory::report(&deltas, &ledger);
                    return Ok(Committed {
                        order,
                        changed: true,
                    });
                }
                Err(RepositoryError::Conflict(reason)) => {
                    debug!(attempt, %reason, "order commit lost a race, retrying");
                    tokio::task::yield_now().await;
                }
                Err(RepositoryError::NotFound) => return Err(OrderError::NotFound(id.clone())),
                Err(e) => return Err(e.into()),
            }
        }

        warn!(order_id = %id, "order commit kept conflicting, giving up");
        Err(OrderError::Conflict(id.clone()))
    }

    fn notify(&self, order: &Order, subject: String, body: String) {
        dispatch(
            Arc::clone(&self.notifier),
            Notification {
                recipient: order.customer.email.clone(),
                subject,
                body,
            },
        );
    }
}
