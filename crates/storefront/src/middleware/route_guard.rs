//! Edge filter for workspace pages.
//!
//! Runs before routing and turns away requests for a guarded page prefix when
//! the role cookie does not name an allowed role. It is a coarse first pass;
//! handlers still check the signed session through
//! [`RequireRoles`](super::auth::RequireRoles).

use std::collections::BTreeSet;

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use bubbling_bath_core::Role;

use super::auth::{ROLES_COOKIE, login_redirect};

/// A guarded path prefix and the roles allowed under it.
#[derive(Debug, Clone, Copy)]
pub struct GuardRule {
    pub prefix: &'static str,
    pub roles: &'static [Role],
}

/// Guarded prefixes, matched in declaration order.
pub const ALLOW_LIST: &[GuardRule] = &[
    GuardRule {
        prefix: "/admin",
        roles: &[Role::Admin],
    },
    GuardRule {
        prefix: "/employee",
        roles: &[Role::Employee, Role::Admin],
    },
    GuardRule {
        prefix: "/customer",
        roles: &[Role::Customer, Role::Admin],
    },
];

/// Whether `path` is `prefix` itself or lies beneath it.
///
/// `/admin` and `/admin/orders` match `/admin`; `/administrator` does not.
#[must_use]
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The first rule guarding `path`, if any.
#[must_use]
pub fn rule_for(path: &str) -> Option<&'static GuardRule> {
    ALLOW_LIST
        .iter()
        .find(|rule| matches_prefix(path, rule.prefix))
}

/// Parse the role cookie.
///
/// Accepts a JSON array (`["admin","employee"]`) or a comma-separated list
/// (`admin,employee`), optionally percent-encoded. Role names are
/// case-insensitive; unknown names are ignored.
#[must_use]
pub fn parse_role_cookie(raw: &str) -> BTreeSet<Role> {
    let decoded = urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), |d| d.into_owned());
    let value = decoded.trim();

    let names: Vec<String> = if value.starts_with('[') {
        serde_json::from_str(value).unwrap_or_default()
    } else {
        value.split(',').map(str::to_owned).collect()
    };

    names
        .iter()
        .filter_map(|name| name.trim().trim_matches('"').parse::<Role>().ok())
        .collect()
}

/// Redirect requests for guarded pages whose role cookie lacks an allowed role.
pub async fn route_guard_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path();

    if let Some(rule) = rule_for(path) {
        let roles = CookieJar::from_headers(request.headers())
            .get(ROLES_COOKIE)
            .map(|cookie| parse_role_cookie(cookie.value()))
            .unwrap_or_default();

        if !rule.roles.iter().any(|role| roles.contains(role)) {
            let target = request
                .uri()
                .path_and_query()
                .map_or(path, |pq| pq.as_str());
            tracing::debug!(path = target, prefix = rule.prefix, "edge filter redirect");
            return Redirect::to(&login_redirect(target)).into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn test_prefix_matches_on_segment_boundary() {
        assert!(matches_prefix("/admin", "/admin"));
        assert!(matches_prefix("/admin/", "/admin"));
        assert!(matches_prefix("/admin/orders/ord_1", "/admin"));
        assert!(!matches_prefix("/administrator", "/admin"));
        assert!(!matches_prefix("/api/admin", "/admin"));
    }

    #[test]
    fn test_rule_for_uses_declaration_order() {
        assert_eq!(rule_for("/employee/orders").unwrap().prefix, "/employee");
        assert_eq!(rule_for("/customer").unwrap().roles, &[Role::Customer, Role::Admin]);
        assert!(rule_for("/").is_none());
        assert!(rule_for("/products").is_none());
    }

    #[test]
    fn test_parse_role_cookie_formats() {
        let both = BTreeSet::from([Role::Admin, Role::Employee]);

        assert_eq!(parse_role_cookie(r#"["admin","employee"]"#), both);
        assert_eq!(parse_role_cookie("admin, employee"), both);
        assert_eq!(parse_role_cookie("ADMIN,Employee"), both);
        assert_eq!(parse_role_cookie("%5B%22admin%22%2C%22employee%22%5D"), both);
        assert_eq!(parse_role_cookie("admin%2Cemployee"), both);
    }

    #[test]
    fn test_parse_role_cookie_tolerates_junk() {
        assert!(parse_role_cookie("").is_empty());
        assert!(parse_role_cookie("[not json").is_empty());
        assert_eq!(
            parse_role_cookie("wizard,customer"),
            BTreeSet::from([Role::Customer])
        );
    }

    fn app() -> Router {
        Router::new()
            .route("/admin/orders", get(|| async { "admin" }))
            .route("/employee", get(|| async { "employee" }))
            .route("/", get(|| async { "home" }))
            .layer(middleware::from_fn(route_guard_middleware))
    }

    async fn get_with_roles(uri: &str, roles: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(roles) = roles {
            request = request.header("cookie", format!("{ROLES_COOKIE}={roles}"));
        }
        app()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_employee_cookie_redirected_from_admin() {
        let response = get_with_roles("/admin/orders?page=2", Some("employee")).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()["location"],
            "/auth/login?next=%2Fadmin%2Forders%3Fpage%3D2"
        );
    }

    #[tokio::test]
    async fn test_employee_cookie_allowed_on_employee_pages() {
        let response = get_with_roles("/employee", Some("employee")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_with_roles("/employee", Some("%5B%22admin%22%5D")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unguarded_paths_pass_without_cookie() {
        let response = get_with_roles("/", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get_with_roles("/employee", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
