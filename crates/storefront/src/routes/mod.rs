//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Store readiness
//!
//! # Auth
//! GET  /auth/login                          - Login page (echoes ?next=)
//! POST /auth/login                          - Login action (rate limited)
//! POST /auth/logout                         - Logout action
//! GET  /api/auth/session                    - Current session
//!
//! # Catalog and checkout
//! GET  /api/products                        - Product listing
//! GET  /api/products/{id}                   - Product detail
//! POST /api/orders                          - Checkout
//!
//! # Workspace pages (edge filter + session role check)
//! GET  /admin                               - Admin dashboard
//! GET  /admin/orders                        - Order list (?status=)
//! GET  /employee, /employee/orders          - Fulfilment queue
//!
//! # Admin API
//! POST   /api/admin/orders/{id}/approve
//! POST   /api/admin/orders/{id}/deny
//! POST   /api/admin/orders/{id}/refund
//! POST   /api/admin/products
//! PUT    /api/admin/products/{id}
//! DELETE /api/admin/products/{id}
//! GET    /api/admin/products/{id}/inventory - Ledger history
//! POST   /api/admin/products/{id}/inventory - Manual adjustment
//!
//! # Fulfilment API
//! GET  /api/employee/orders/{id}
//! POST /api/employee/orders/{id}/status
//! ```

pub mod auth;
pub mod orders;
pub mod products;
pub mod workspace;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn,
    routing::{get, post},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    login_rate_limiter, request_id_middleware, route_guard_middleware,
    security_headers_middleware,
};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page))
        .route("/login", post(auth::login).layer(login_rate_limiter()))
        .route("/logout", post(auth::logout))
}

/// Create the admin API router.
pub fn admin_api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/approve", post(orders::approve))
        .route("/orders/{id}/deny", post(orders::deny))
        .route("/orders/{id}/refund", post(orders::refund))
        .route("/products", post(products::create))
        .route(
            "/products/{id}",
            axum::routing::put(products::update).delete(products::delete),
        )
        .route(
            "/products/{id}/inventory",
            get(products::inventory_history).post(products::adjust_inventory),
        )
}

/// Create the fulfilment API router.
pub fn employee_api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}", get(orders::detail))
        .route("/orders/{id}/status", post(orders::advance_status))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        // Auth
        .nest("/auth", auth_routes())
        .route("/api/auth/session", get(auth::session_info))
        // Catalog and checkout
        .route("/api/products", get(products::index))
        .route("/api/products/{id}", get(products::show))
        .route("/api/orders", post(orders::checkout))
        // Workspace pages
        .route("/admin", get(workspace::admin_dashboard))
        .route("/admin/orders", get(workspace::admin_orders))
        .route("/employee", get(workspace::employee_queue))
        .route("/employee/orders", get(workspace::employee_queue))
        // APIs
        .nest("/api/admin", admin_api_routes())
        .nest("/api/employee", employee_api_routes())
}

/// The full application with its middleware stack.
///
/// Sentry layers are added by the binary on top of this.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(from_fn(route_guard_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
