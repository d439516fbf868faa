//! Application state shared across handlers.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::StorefrontConfig;
use crate::db::DataStore;
use crate::services::auth::AuthService;
use crate::services::inventory::InventoryLedger;
use crate::services::notify::Notifier;
use crate::services::orders::OrderService;
use crate::services::session_codec::SessionCodec;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the data store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    codec: SessionCodec,
    notifier: Arc<dyn Notifier>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Persistence backend
    /// * `clock` - Time source for sessions, timelines and labels
    /// * `notifier` - Customer notification channel
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn DataStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let codec = SessionCodec::new(
            config.session_secret.clone(),
            config.session_ttl_secs,
            Arc::clone(&clock),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                clock,
                codec,
                notifier,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the data store.
    #[must_use]
    pub fn store(&self) -> &dyn DataStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the clock.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Get a reference to the session codec.
    #[must_use]
    pub fn codec(&self) -> &SessionCodec {
        &self.inner.codec
    }

    /// Authentication service over the credential store.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.store(), self.clock())
    }

    /// Order lifecycle service.
    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self.store(), self.clock(), Arc::clone(&self.inner.notifier))
    }

    /// Inventory ledger.
    #[must_use]
    pub fn inventory(&self) -> InventoryLedger<'_> {
        InventoryLedger::new(self.store(), self.clock())
    }
}
