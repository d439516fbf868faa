//! Integration tests for the Bubbling Bath Delights storefront.
//!
//! Each test spawns the full application (every middleware layer included)
//! on an ephemeral port, backed by a JSON document store in a temp
//! directory, and drives it over HTTP with `reqwest`.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bubbling-bath-integration-tests
//! ```
//!
//! No database or external service is needed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode, redirect};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};

use bubbling_bath_core::{Email, ProductId, Role, Workspace};
use bubbling_bath_storefront::clock::SystemClock;
use bubbling_bath_storefront::config::{DEFAULT_SESSION_TTL_SECS, StoreBackend, StorefrontConfig};
use bubbling_bath_storefront::db::{CredentialStore, DataStore, JsonStore, ProductStore};
use bubbling_bath_storefront::models::{ProductInput, UserRecord};
use bubbling_bath_storefront::routes;
use bubbling_bath_storefront::services::auth::password::sha256_record;
use bubbling_bath_storefront::services::notify::{Notification, OutboxNotifier};
use bubbling_bath_storefront::state::AppState;

pub const ADMIN_EMAIL: &str = "owner@bubblingbath.test";
pub const ADMIN_PASSWORD: &str = "bath-bomb-bonanza-9";
pub const EMPLOYEE_EMAIL: &str = "maya@bubblingbath.test";
pub const EMPLOYEE_PASSWORD: &str = "rose-petal-42";

/// Seeded product ids (slugs of their SKUs).
pub const LAVENDER: &str = "bb-lav-001";
pub const ROSE: &str = "bb-rose-002";

/// A running storefront with seeded staff and catalog.
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<JsonStore>,
    pub outbox: Arc<OutboxNotifier>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    /// Seed a fresh store and serve the app on `127.0.0.1:0`.
    ///
    /// # Panics
    ///
    /// Panics if the temp store or the listener cannot be set up.
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonStore::open(&path).await.expect("Failed to open store"));

        seed_user(&store, Workspace::Admin, ADMIN_EMAIL, "Owner", ADMIN_PASSWORD, Role::Admin).await;
        seed_user(
            &store,
            Workspace::Employee,
            EMPLOYEE_EMAIL,
            "Maya",
            EMPLOYEE_PASSWORD,
            Role::Employee,
        )
        .await;
        seed_product(&store, "Lavender Dream Bomb", "BB-LAV-001", "12.50", 5).await;
        seed_product(&store, "Rose Petal Soak", "BB-ROSE-002", "8.00", 10).await;

        let config = StorefrontConfig {
            host: "127.0.0.1".parse().expect("valid host"),
            port: 0,
            base_url: "http://127.0.0.1".to_string(),
            session_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6v"),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            store: StoreBackend::Json { path },
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let outbox = Arc::new(OutboxNotifier::new());
        let data_store: Arc<dyn DataStore> = store.clone();
        let state = AppState::new(config, data_store, Arc::new(SystemClock), outbox.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("listener has an address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                routes::app(state).into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("test server failed");
        });

        Self {
            addr,
            store,
            outbox,
            _dir: dir,
        }
    }

    /// Absolute URL for `path`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Current stock for a product.
    ///
    /// # Panics
    ///
    /// Panics if the product does not exist.
    pub async fn stock(&self, id: &str) -> u32 {
        self.store
            .get_product(&ProductId::from(id))
            .await
            .expect("store read failed")
            .expect("product exists")
            .inventory
    }

    /// Notifications are delivered from spawned tasks; poll until `count`
    /// have arrived or a second has passed.
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..100 {
            let sent = self.outbox.sent().await;
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.outbox.sent().await
    }

    /// Sign in and return a client carrying the session and role cookies.
    ///
    /// # Panics
    ///
    /// Panics if the login is not answered with a redirect.
    pub async fn login(&self, workspace: &str, email: &str, password: &str) -> Client {
        let client = client();
        let response = client
            .post(self.url("/auth/login"))
            .form(&[
                ("email", email),
                ("password", password),
                ("workspace", workspace),
            ])
            .send()
            .await
            .expect("login request failed");
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login should redirect");
        client
    }

    pub async fn admin(&self) -> Client {
        self.login("admin", ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    pub async fn employee(&self) -> Client {
        self.login("employee", EMPLOYEE_EMAIL, EMPLOYEE_PASSWORD).await
    }

    /// Place an order as an anonymous shopper and return it.
    ///
    /// # Panics
    ///
    /// Panics if checkout does not answer 201.
    pub async fn checkout(&self, items: &[(&str, &str, u32)]) -> Value {
        let response = client()
            .post(self.url("/api/orders"))
            .json(&checkout_body(items))
            .send()
            .await
            .expect("checkout request failed");
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.expect("order json")
    }
}

/// A client with a cookie store that does not follow redirects.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(redirect::Policy::none())
        .build()
        .expect("Failed to create HTTP client")
}

/// Checkout payload for `(product_id, unit_price, quantity)` lines.
#[must_use]
pub fn checkout_body(items: &[(&str, &str, u32)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(id, price, quantity)| {
            json!({
                "product_id": id,
                "name": id,
                "unit_price": price,
                "quantity": quantity,
            })
        })
        .collect();

    json!({
        "customer": { "name": "Jo Bather", "email": "jo@example.test" },
        "items": items,
        "payment": { "method": "card", "last4": "4242" },
        "shipping": {
            "address": {
                "line1": "12 Suds Lane",
                "city": "Portland",
                "region": "OR",
                "postal_code": "97201",
                "country": "US"
            },
            "method": "standard"
        }
    })
}

async fn seed_user(
    store: &JsonStore,
    pool: Workspace,
    email: &str,
    name: &str,
    password: &str,
    role: Role,
) {
    let email = Email::parse(email).expect("valid seed email");
    let user = UserRecord::new(email, name, sha256_record(password, "bath-salt"), [role])
        .expect("valid seed user");
    store.upsert_user(pool, user).await.expect("seed user");
}

async fn seed_product(store: &JsonStore, name: &str, sku: &str, price: &str, inventory: i64) {
    let input = ProductInput {
        name: name.to_string(),
        sku: Some(sku.to_string()),
        price: price.parse::<Decimal>().expect("valid seed price"),
        inventory: Some(inventory),
        category: "bath-bombs".to_string(),
        season: "spring".to_string(),
        description: String::new(),
        short_description: None,
        tags: Vec::new(),
        rating: None,
        review_count: None,
    };
    let product = input.into_new_product(Utc::now()).expect("valid seed product");
    store.insert_product(product).await.expect("seed product");
}
