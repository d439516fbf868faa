//! Inventory ledger.
//!
//! Turns order lines into stock deltas and applies them through the product
//! store, which clamps at zero and records a ledger entry per product.

use std::collections::BTreeMap;

use tracing::{debug, instrument, warn};

use bubbling_bath_core::ProductId;

use crate::clock::Clock;
use crate::db::{DataStore, RepositoryError};
use crate::models::{FieldError, LedgerEntry, LineItem, StockDelta};

/// Errors from direct stock operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("product not found: {0}")]
    NotFound(ProductId),

    #[error("validation failed: {0}")]
    Validation(#[from] FieldError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Stock operations over a [`DataStore`].
pub struct InventoryLedger<'a> {
    store: &'a dyn DataStore,
    clock: &'a dyn Clock,
}

impl<'a> InventoryLedger<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// Deltas that take stock for every line, one per product.
    #[must_use]
    pub fn decrement_deltas(items: &[LineItem], reason: &str) -> Vec<StockDelta> {
        Self::deltas(items, reason, -1)
    }

    /// Deltas that return stock for every line, one per product.
    #[must_use]
    pub fn restock_deltas(items: &[LineItem], reason: &str) -> Vec<StockDelta> {
        Self::deltas(items, reason, 1)
    }

    fn deltas(items: &[LineItem], reason: &str, sign: i64) -> Vec<StockDelta> {
        let mut totals: BTreeMap<&ProductId, i64> = BTreeMap::new();
        for item in items {
            *totals.entry(&item.product_id).or_insert(0) += i64::from(item.quantity);
        }

        totals
            .into_iter()
            .map(|(product_id, quantity)| StockDelta {
                product_id: product_id.clone(),
                delta: sign * quantity,
                reason: reason.to_owned(),
            })
            .collect()
    }

    /// Take stock for a batch of `(product, quantity)` pairs in one write.
    ///
    /// Stock never goes below zero; products that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Repository` if the write fails, in which case
    /// nothing was applied.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn decrement(
        &self,
        items: &[(ProductId, u32)],
        reason: &str,
    ) -> Result<Vec<LedgerEntry>, InventoryError> {
        let deltas: Vec<StockDelta> = items
            .iter()
            .map(|(product_id, quantity)| StockDelta {
                product_id: product_id.clone(),
                delta: -i64::from(*quantity),
                reason: reason.to_owned(),
            })
            .collect();

        let entries = self
            .store
            .apply_stock_deltas(&deltas, self.clock.now())
            .await?;
        report(&deltas, &entries);
        Ok(entries)
    }

    /// Manually adjust one product's stock.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Validation` for a zero delta or blank reason,
    /// and `InventoryError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn adjust(
        &self,
        product_id: &ProductId,
        delta: i64,
        reason: &str,
    ) -> Result<LedgerEntry, InventoryError> {
        if delta == 0 {
            return Err(FieldError::new("delta", "delta cannot be zero").into());
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(FieldError::new("reason", "a reason is required").into());
        }

        let deltas = [StockDelta {
            product_id: product_id.clone(),
            delta,
            reason: reason.to_owned(),
        }];
        let entries = self
            .store
            .apply_stock_deltas(&deltas, self.clock.now())
            .await?;
        report(&deltas, &entries);

        entries
            .into_iter()
            .next()
            .ok_or_else(|| InventoryError::NotFound(product_id.clone()))
    }

    /// Ledger entries for a product, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::NotFound` if the product does not exist.
    pub async fn history(&self, product_id: &ProductId) -> Result<Vec<LedgerEntry>, InventoryError> {
        if self.store.get_product(product_id).await?.is_none() {
            return Err(InventoryError::NotFound(product_id.clone()));
        }
        Ok(self.store.stock_history(product_id).await?)
    }
}

/// Log skipped and clamped deltas after a batch was applied.
pub fn report(deltas: &[StockDelta], entries: &[LedgerEntry]) {
    for delta in deltas {
        match entries.iter().find(|e| e.product_id == delta.product_id) {
            None => warn!(
                product_id = %delta.product_id,
                delta = delta.delta,
                "stock change skipped: unknown product"
            ),
            Some(entry) if entry.applied != entry.requested => debug!(
                product_id = %entry.product_id,
                requested = entry.requested,
                applied = entry.applied,
                "stock change clamped at zero"
            ),
            Some(_) => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use bubbling_bath_core::Money;
    use chrono::Utc;

    use super::*;
    use crate::clock::FixedClock;
    use crate::db::{JsonStore, ProductStore};
    use crate::models::product::tests::product;

    fn line(id: &str, quantity: u32) -> LineItem {
        LineItem {
            product_id: ProductId::new(id),
            name: id.to_owned(),
            unit_price: Money::from_cents(500),
            quantity,
        }
    }

    async fn store_with(products: &[(&str, u32)]) -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json")).await.unwrap();
        for (id, stock) in products {
            store.insert_product(product(id, *stock)).await.unwrap();
        }
        (dir, store)
    }

    #[test]
    fn test_deltas_merge_lines_per_product() {
        let items = [line("rose", 2), line("lavender", 1), line("rose", 3)];
        let deltas = InventoryLedger::decrement_deltas(&items, "approve");

        assert_eq!(deltas.len(), 2);
        let rose = deltas.iter().find(|d| d.product_id.as_str() == "rose").unwrap();
        assert_eq!(rose.delta, -5);

        let restock = InventoryLedger::restock_deltas(&items, "refund");
        assert!(restock.iter().all(|d| d.delta > 0));
    }

    #[tokio::test]
    async fn test_decrement_clamps_at_zero() {
        let (_dir, store) = store_with(&[("rose", 5), ("lavender", 4)]).await;
        let clock = FixedClock::new(Utc::now());
        let ledger = InventoryLedger::new(&store, &clock);

        ledger
            .decrement(&[(ProductId::new("rose"), 7)], "manual")
            .await
            .unwrap();

        let rose = store.get_product(&ProductId::new("rose")).await.unwrap().unwrap();
        let lavender = store
            .get_product(&ProductId::new("lavender"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rose.inventory, 0);
        assert_eq!(lavender.inventory, 4);
    }

    #[tokio::test]
    async fn test_decrement_skips_unknown_products() {
        let (_dir, store) = store_with(&[("rose", 5)]).await;
        let clock = FixedClock::new(Utc::now());
        let ledger = InventoryLedger::new(&store, &clock);

        let entries = ledger
            .decrement(
                &[(ProductId::new("ghost"), 1), (ProductId::new("rose"), 1)],
                "manual",
            )
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].stock_after, 4);
    }

    #[tokio::test]
    async fn test_adjust_and_history() {
        let (_dir, store) = store_with(&[("rose", 5)]).await;
        let clock = FixedClock::new(Utc::now());
        let ledger = InventoryLedger::new(&store, &clock);
        let rose = ProductId::new("rose");

        let entry = ledger.adjust(&rose, 10, "restock from supplier").await.unwrap();
        assert_eq!(entry.stock_after, 15);
        ledger.adjust(&rose, -3, "damaged").await.unwrap();

        let history = ledger.history(&rose).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].stock_after, 12);
    }

    #[tokio::test]
    async fn test_adjust_rejects_bad_input() {
        let (_dir, store) = store_with(&[("rose", 5)]).await;
        let clock = FixedClock::new(Utc::now());
        let ledger = InventoryLedger::new(&store, &clock);

        assert!(matches!(
            ledger.adjust(&ProductId::new("rose"), 0, "noop").await,
            Err(InventoryError::Validation(_))
        ));
        assert!(matches!(
            ledger.adjust(&ProductId::new("rose"), 1, "  ").await,
            Err(InventoryError::Validation(_))
        ));
        assert!(matches!(
            ledger.adjust(&ProductId::new("ghost"), 1, "found one").await,
            Err(InventoryError::NotFound(_))
        ));
    }
}
