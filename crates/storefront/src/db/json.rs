//! Flat-file document store.
//!
//! The whole data set lives in one JSON document. Every mutation re-reads the
//! document, applies the change under an async mutex and writes the result to
//! a temporary file that is then renamed over the original, so a commit is
//! a single atomic replace on disk.
//!
//! The mutex serializes writers in this process only. Deployments with more
//! than one server instance should use the `PostgreSQL` backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::instrument;

use bubbling_bath_core::{Email, OrderId, ProductId, Workspace};

use super::{CredentialStore, DataStore, OrderStore, ProductStore, RepositoryError};
use crate::models::product::apply_stock_deltas;
use crate::models::{
    LedgerEntry, LoyaltyConfig, Order, Product, ProductInput, StockDelta, UserRecord,
};

/// Credential pools keyed by workspace.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct CredentialPools {
    admin: Vec<UserRecord>,
    employee: Vec<UserRecord>,
}

impl CredentialPools {
    fn pool(&self, workspace: Workspace) -> &[UserRecord] {
        match workspace {
            Workspace::Admin => &self.admin,
            Workspace::Employee => &self.employee,
        }
    }

    fn pool_mut(&mut self, workspace: Workspace) -> &mut Vec<UserRecord> {
        match workspace {
            Workspace::Admin => &mut self.admin,
            Workspace::Employee => &mut self.employee,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
struct StoreDocument {
    users: CredentialPools,
    loyalty: LoyaltyConfig,
    products: Vec<Product>,
    orders: Vec<Order>,
    inventory_ledger: Vec<LedgerEntry>,
}

impl StoreDocument {
    /// Version-check and replace an order in place.
    fn replace_order(&mut self, mut order: Order, expected_version: u64) -> Result<Order, RepositoryError> {
        let slot = self
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or(RepositoryError::NotFound)?;

        if slot.version != expected_version {
            return Err(RepositoryError::Conflict(format!(
                "order {} is at version {}, expected {expected_version}",
                order.id, slot.version
            )));
        }

        order.version = expected_version + 1;
        *slot = order.clone();
        Ok(order)
    }
}

/// JSON document store.
pub struct JsonStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Open the store at `path`, creating an empty document if none exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Io` if the directory or file cannot be
    /// created, or `RepositoryError::Serialization` if an existing document
    /// is not valid.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };

        if let Some(parent) = store.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        if tokio::fs::try_exists(&store.path).await? {
            // Fail fast on a corrupt document rather than on the first request.
            store.read().await?;
        } else {
            store.write(&StoreDocument::default()).await?;
        }

        Ok(store)
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StoreDocument, RepositoryError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StoreDocument::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, doc: &StoreDocument) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("store.json");
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Read-modify-write under the writer lock.
    ///
    /// The document is only written back when `f` succeeds.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<T, RepositoryError> + Send,
    ) -> Result<T, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read().await?;
        let out = f(&mut doc)?;
        self.write(&doc).await?;
        Ok(out)
    }
}

#[async_trait]
impl CredentialStore for JsonStore {
    async fn find_user(
        &self,
        email: &Email,
        pool: Workspace,
    ) -> Result<Option<UserRecord>, RepositoryError> {
        let doc = self.read().await?;
        Ok(doc
            .users
            .pool(pool)
            .iter()
            .find(|u| &u.email == email)
            .cloned())
    }

    async fn touch_last_login(
        &self,
        email: &Email,
        pool: Workspace,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.mutate(|doc| {
            let user = doc
                .users
                .pool_mut(pool)
                .iter_mut()
                .find(|u| &u.email == email)
                .ok_or(RepositoryError::NotFound)?;
            user.last_login_at = Some(at);
            Ok(())
        })
        .await
    }

    async fn upsert_user(&self, pool: Workspace, user: UserRecord) -> Result<(), RepositoryError> {
        self.mutate(move |doc| {
            let users = doc.users.pool_mut(pool);
            match users.iter_mut().find(|u| u.email == user.email) {
                Some(existing) => *existing = user,
                None => users.push(user),
            }
            Ok(())
        })
        .await
    }

    async fn loyalty_config(&self) -> Result<LoyaltyConfig, RepositoryError> {
        Ok(self.read().await?.loyalty)
    }
}

#[async_trait]
impl ProductStore for JsonStore {
    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut products = self.read().await?.products;
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .read()
            .await?
            .products
            .into_iter()
            .find(|p| &p.id == id))
    }

    async fn insert_product(&self, product: Product) -> Result<Product, RepositoryError> {
        self.mutate(move |doc| {
            if doc.products.iter().any(|p| p.id == product.id) {
                return Err(RepositoryError::Conflict(format!(
                    "product {} already exists",
                    product.id
                )));
            }
            doc.products.push(product.clone());
            Ok(product)
        })
        .await
    }

    async fn update_product(
        &self,
        id: &ProductId,
        input: ProductInput,
    ) -> Result<Product, RepositoryError> {
        self.mutate(move |doc| {
            let slot = doc
                .products
                .iter_mut()
                .find(|p| &p.id == id)
                .ok_or(RepositoryError::NotFound)?;
            let product = input.into_replacement(slot)?;
            *slot = product.clone();
            Ok(product)
        })
        .await
    }

    async fn delete_product(&self, id: &ProductId) -> Result<(), RepositoryError> {
        self.mutate(|doc| {
            let before = doc.products.len();
            doc.products.retain(|p| &p.id != id);
            if doc.products.len() == before {
                return Err(RepositoryError::NotFound);
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, deltas), fields(count = deltas.len()))]
    async fn apply_stock_deltas(
        &self,
        deltas: &[StockDelta],
        at: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        self.mutate(|doc| {
            let entries = apply_stock_deltas(&mut doc.products, deltas, at);
            doc.inventory_ledger.extend(entries.iter().cloned());
            Ok(entries)
        })
        .await
    }

    async fn stock_history(&self, id: &ProductId) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(self
            .read()
            .await?
            .inventory_ledger
            .into_iter()
            .filter(|e| &e.product_id == id)
            .collect())
    }
}

#[async_trait]
impl OrderStore for JsonStore {
    async fn list_orders(&self) -> Result<Vec<Order>, RepositoryError> {
        let mut orders = self.read().await?.orders;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.read().await?.orders.into_iter().find(|o| &o.id == id))
    }

    async fn insert_order(&self, mut order: Order) -> Result<Order, RepositoryError> {
        order.version = 1;
        self.mutate(move |doc| {
            if doc.orders.iter().any(|o| o.id == order.id) {
                return Err(RepositoryError::Conflict(format!(
                    "order {} already exists",
                    order.id
                )));
            }
            doc.orders.push(order.clone());
            Ok(order)
        })
        .await
    }

    async fn save_order(
        &self,
        order: Order,
        expected_version: u64,
    ) -> Result<Order, RepositoryError> {
        self.mutate(move |doc| doc.replace_order(order, expected_version))
            .await
    }

    #[instrument(skip(self, order, deltas), fields(order_id = %order.id))]
    async fn save_order_with_stock(
        &self,
        order: Order,
        expected_version: u64,
        deltas: &[StockDelta],
        at: DateTime<Utc>,
    ) -> Result<(Order, Vec<LedgerEntry>), RepositoryError> {
        self.mutate(move |doc| {
            // Version check first: a stale commit must not touch stock.
            let saved = doc.replace_order(order, expected_version)?;
            let entries = apply_stock_deltas(&mut doc.products, deltas, at);
            doc.inventory_ledger.extend(entries.iter().cloned());
            Ok((saved, entries))
        })
        .await
    }
}

#[async_trait]
impl DataStore for JsonStore {
    async fn health_check(&self) -> Result<(), RepositoryError> {
        self.read().await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use bubbling_bath_core::Role;

    use super::*;
    use crate::models::product::tests::product;

    async fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("data/store.json"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_open_creates_empty_document() {
        let (_dir, store) = store().await;
        assert!(store.path().exists());
        assert!(store.list_products().await.unwrap().is_empty());
        assert_eq!(store.loyalty_config().await.unwrap(), LoyaltyConfig::default());
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonStore::open(&path).await,
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_find_user_is_case_insensitive_and_pool_scoped() {
        let (_dir, store) = store().await;
        let user = UserRecord::new(
            Email::parse("Ops@BubblingBath.test").unwrap(),
            "Ops",
            "plain$pw",
            [Role::Employee],
        )
        .unwrap();
        store.upsert_user(Workspace::Employee, user).await.unwrap();

        let lookup = Email::parse("ops@bubblingbath.test").unwrap();
        assert!(store
            .find_user(&lookup, Workspace::Employee)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_user(&lookup, Workspace::Admin)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_insert_product_conflicts_on_duplicate() {
        let (_dir, store) = store().await;
        store.insert_product(product("rose", 3)).await.unwrap();
        assert!(matches!(
            store.insert_product(product("rose", 1)).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_stock_deltas_clamp_and_record_history() {
        let (_dir, store) = store().await;
        store.insert_product(product("rose", 5)).await.unwrap();

        let deltas = [StockDelta {
            product_id: ProductId::new("rose"),
            delta: -7,
            reason: "test".to_owned(),
        }];
        let entries = store.apply_stock_deltas(&deltas, Utc::now()).await.unwrap();

        assert_eq!(entries[0].stock_after, 0);
        let rose = store
            .get_product(&ProductId::new("rose"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rose.inventory, 0);
        assert_eq!(
            store
                .stock_history(&ProductId::new("rose"))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_product_builds_from_stored_row() {
        let (_dir, store) = store().await;
        store.insert_product(product("rose", 5)).await.unwrap();
        let edit = |body: serde_json::Value| -> ProductInput { serde_json::from_value(body).unwrap() };

        let deltas = [StockDelta {
            product_id: ProductId::new("rose"),
            delta: -2,
            reason: "order approved".to_owned(),
        }];
        store.apply_stock_deltas(&deltas, Utc::now()).await.unwrap();

        let updated = store
            .update_product(
                &ProductId::new("rose"),
                edit(serde_json::json!({"name": "Rose Soak", "price": "8", "season": "summer"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.inventory, 3);
        assert_eq!(updated.name, "Rose Soak");

        assert!(matches!(
            store
                .update_product(
                    &ProductId::new("rose"),
                    edit(serde_json::json!({"name": "", "price": "8", "season": "summer"})),
                )
                .await,
            Err(RepositoryError::Invalid(ref e)) if e.field == "name"
        ));
        assert!(matches!(
            store
                .update_product(
                    &ProductId::new("ghost"),
                    edit(serde_json::json!({"name": "x", "price": "1", "season": "fall"})),
                )
                .await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_product_is_not_found() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.delete_product(&ProductId::new("ghost")).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let (dir, store) = store().await;
        store.insert_product(product("rose", 5)).await.unwrap();
        drop(store);

        let reopened = JsonStore::open(dir.path().join("data/store.json"))
            .await
            .unwrap();
        assert_eq!(reopened.list_products().await.unwrap().len(), 1);
    }
}
