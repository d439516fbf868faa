//! Catalog products and stock movements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bubbling_bath_core::{Money, ProductId, Season};

use super::FieldError;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Money,
    /// Units on hand. Never negative.
    pub inventory: u32,
    pub category: String,
    pub season: Season,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Apply a signed stock change, clamping at zero.
    ///
    /// Returns the stock before and after the change.
    pub fn apply_stock_delta(&mut self, delta: i64) -> (u32, u32) {
        let before = self.inventory;
        self.inventory = clamp_stock(before, delta);
        (before, self.inventory)
    }
}

/// Highest stock level a product can hold in either store.
///
/// Matches the `INTEGER` inventory column in `PostgreSQL`.
pub const MAX_STOCK: u32 = 2_147_483_647;

/// New stock level after applying `delta` to `current`, kept within
/// `0..=MAX_STOCK`.
#[must_use]
pub fn clamp_stock(current: u32, delta: i64) -> u32 {
    let next = i64::from(current)
        .saturating_add(delta)
        .clamp(0, i64::from(MAX_STOCK));
    u32::try_from(next).unwrap_or(MAX_STOCK)
}

/// A requested change to one product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: ProductId,
    /// Negative to take stock, positive to return it.
    pub delta: i64,
    pub reason: String,
}

/// A stock change as it was actually applied.
///
/// `applied` differs from `requested` when the change was clamped at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub product_id: ProductId,
    pub requested: i64,
    pub applied: i64,
    pub stock_before: u32,
    pub stock_after: u32,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

/// Apply a batch of deltas to an in-memory product list.
///
/// Deltas naming a product that is not in `products` are skipped and produce
/// no ledger entry.
pub fn apply_stock_deltas(
    products: &mut [Product],
    deltas: &[StockDelta],
    at: DateTime<Utc>,
) -> Vec<LedgerEntry> {
    let mut entries = Vec::with_capacity(deltas.len());

    for delta in deltas {
        let Some(product) = products.iter_mut().find(|p| p.id == delta.product_id) else {
            continue;
        };

        let (before, after) = product.apply_stock_delta(delta.delta);
        entries.push(LedgerEntry {
            product_id: delta.product_id.clone(),
            requested: delta.delta,
            applied: i64::from(after) - i64::from(before),
            stock_before: before,
            stock_after: after,
            reason: delta.reason.clone(),
            recorded_at: at,
        });
    }

    entries
}

/// Admin payload for creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub inventory: Option<i64>,
    #[serde(default)]
    pub category: String,
    pub season: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

impl ProductInput {
    /// Validate and build a brand-new product.
    ///
    /// The id is the slug of the SKU, or a random id when there is no usable
    /// SKU.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` naming the first invalid field.
    pub fn into_new_product(self, now: DateTime<Utc>) -> Result<Product, FieldError> {
        let sku = normalize_optional(self.sku.clone());
        let id = ProductId::for_sku(sku.as_deref());
        let inventory = self.inventory.unwrap_or(0);
        self.build(id, inventory, now)
    }

    /// Validate and build a replacement for `existing`.
    ///
    /// The id and creation time are kept; stock is kept unless the payload
    /// sets it.
    ///
    /// # Errors
    ///
    /// Returns `FieldError` naming the first invalid field.
    pub fn into_replacement(self, existing: &Product) -> Result<Product, FieldError> {
        let inventory = self
            .inventory
            .unwrap_or_else(|| i64::from(existing.inventory));
        let review_count = self.review_count.unwrap_or(existing.review_count);
        let rating = self.rating.unwrap_or(existing.rating);

        Self {
            rating: Some(rating),
            review_count: Some(review_count),
            ..self
        }
        .build(existing.id.clone(), inventory, existing.created_at)
    }

    fn build(self, id: ProductId, inventory: i64, created_at: DateTime<Utc>) -> Result<Product, FieldError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(FieldError::new("name", "name cannot be empty"));
        }

        let price = Money::new(self.price)
            .map_err(|_| FieldError::new("price", "price cannot be negative"))?;

        let inventory = u32::try_from(inventory)
            .map_err(|_| FieldError::new("inventory", "inventory must be zero or more"))?;
        if inventory > MAX_STOCK {
            return Err(FieldError::new("inventory", "inventory is too large"));
        }

        let season = self
            .season
            .parse::<Season>()
            .map_err(|e| FieldError::new("season", e.to_string()))?;

        let rating = self.rating.unwrap_or(0.0);
        if !(0.0..=5.0).contains(&rating) {
            return Err(FieldError::new("rating", "rating must be between 0 and 5"));
        }

        Ok(Product {
            id,
            name,
            sku: normalize_optional(self.sku),
            price,
            inventory,
            category: self.category.trim().to_owned(),
            season,
            description: self.description,
            short_description: normalize_optional(self.short_description),
            tags: self
                .tags
                .into_iter()
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .collect(),
            rating,
            review_count: self.review_count.unwrap_or(0),
            created_at,
        })
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
