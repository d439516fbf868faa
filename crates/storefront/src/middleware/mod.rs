//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers
//! 5. Route guard (role-cookie edge filter for workspace pages)
//! 6. Rate limiting on the login form (governor)

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod route_guard;
pub mod security_headers;

pub use auth::{
    AdminOnly, AuthRejection, OptionalSession, RequireRoles, RolePolicy, StaffOnly,
    clear_auth_cookies, require_role, set_auth_cookies,
};
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use route_guard::route_guard_middleware;
pub use security_headers::security_headers_middleware;
