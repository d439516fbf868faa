//! Orders, their sub-records and the checkout payload.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bubbling_bath_core::{
    DeliveryMethod, Email, Money, OrderId, OrderStatus, PaymentStatus, ProductId,
};

use super::FieldError;

/// Who placed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: Email,
}

/// One product line. Quantity is at least one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl LineItem {
    /// Unit price times quantity, or `None` if the amount overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_times(self.quantity)
    }
}

/// Payment as reported by the payment collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: String,
    #[serde(default)]
    pub last4: Option<String>,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: String,
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipping {
    pub address: Address,
    #[serde(default)]
    pub method: DeliveryMethod,
}

/// An immutable record of a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: OrderStatus,
    #[serde(default)]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// A customer order.
///
/// `version` increases by one on every persisted change and is what the
/// stores compare for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub payment: Payment,
    pub shipping: Shipping,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub denial_reason: Option<String>,
    #[serde(default)]
    pub loyalty_points: u64,
    pub timeline: Vec<TimelineEntry>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Set the status and append the matching timeline entry.
    ///
    /// Entry timestamps strictly increase: if `now` is not after the last
    /// entry, the new entry is placed one millisecond after it.
    pub fn record_status(&mut self, status: OrderStatus, note: Option<String>, now: DateTime<Utc>) {
        let at = match self.timeline.last() {
            Some(last) if now <= last.at => last.at + Duration::milliseconds(1),
            _ => now,
        };

        self.status = status;
        self.updated_at = at;
        self.timeline.push(TimelineEntry { status, note, at });
    }

    /// Number of timeline entries with the given status.
    #[must_use]
    pub fn timeline_count(&self, status: OrderStatus) -> usize {
        self.timeline.iter().filter(|e| e.status == status).count()
    }
}

/// Checkout line as submitted by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i64,
}

/// Payment as submitted at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentInput {
    pub method: String,
    #[serde(default)]
    pub last4: Option<String>,
}

/// Checkout payload for `OrderService::create`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer: Customer,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub discount: Option<Decimal>,
    pub payment: PaymentInput,
    pub shipping: Shipping,
}

/// Checkout payload after validation.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub customer: Customer,
    pub items: Vec<LineItem>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub payment: PaymentInput,
    pub shipping: Shipping,
}

impl NewOrder {
    /// Check the payload and compute the totals.
    ///
    /// The discount is capped at the subtotal so the total never drops
    /// below zero.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` naming the first invalid field.
    pub fn validate(self) -> Result<ValidatedOrder, FieldError> {
        if self.items.is_empty() {
            return Err(FieldError::new("items", "an order needs at least one item"));
        }

        let items = self
            .items
            .into_iter()
            .map(|item| {
                let quantity = u32::try_from(item.quantity)
                    .ok()
                    .filter(|q| *q >= 1)
                    .ok_or_else(|| FieldError::new("quantity", "quantity must be at least 1"))?;
                let unit_price = Money::new(item.unit_price)
                    .map_err(|_| FieldError::new("unit_price", "price cannot be negative"))?;
                Ok(LineItem {
                    product_id: item.product_id,
                    name: item.name,
                    unit_price,
                    quantity,
                })
            })
            .collect::<Result<Vec<_>, FieldError>>()?;

        let discount = Money::new(self.discount.unwrap_or(Decimal::ZERO))
            .map_err(|_| FieldError::new("discount", "discount cannot be negative"))?;

        if self.shipping.address.postal_code.trim().is_empty() {
            return Err(FieldError::new("postal_code", "postal code is required"));
        }
        if self.shipping.address.city.trim().is_empty() {
            return Err(FieldError::new("city", "city is required"));
        }

        let subtotal = items
            .iter()
            .map(LineItem::line_total)
            .collect::<Option<Vec<_>>>()
            .and_then(Money::checked_sum)
            .ok_or_else(|| FieldError::new("unit_price", "amount too large"))?;
        let discount = discount.min(subtotal);
        let total = subtotal.saturating_sub(discount);

        Ok(ValidatedOrder {
            customer: self.customer,
            items,
            subtotal,
            discount,
            total,
            payment: self.payment,
            shipping: self.shipping,
        })
    }
}
