//! Authentication middleware and extractors.
//!
//! The signed session lives in the `bbd_session` cookie. A second cookie,
//! `bbd_roles`, mirrors the role set for the edge filter in
//! [`super::route_guard`]; it is never trusted for authorization by handlers.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use bubbling_bath_core::Role;

use crate::config::StorefrontConfig;
use crate::models::Session;
use crate::services::session_codec::SessionCodec;
use crate::state::AppState;

/// Cookie carrying the signed session token.
pub const SESSION_COOKIE: &str = "bbd_session";

/// Cookie carrying the role set for the edge filter.
pub const ROLES_COOKIE: &str = "bbd_roles";

/// Login page path.
pub const LOGIN_PATH: &str = "/auth/login";

/// Why a request was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRejection {
    /// Redirect to the login page, returning to `next` afterwards.
    RedirectToLogin { next: String },
    /// No valid session (API requests).
    Unauthorized,
    /// Valid session without a required role (API requests).
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => Redirect::to(&login_redirect(&next)).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

/// Login URL that returns to `next` after signing in.
#[must_use]
pub fn login_redirect(next: &str) -> String {
    format!("{LOGIN_PATH}?next={}", urlencoding::encode(next))
}

fn is_api(path: &str) -> bool {
    path.starts_with("/api/")
}

/// Decode the session cookie, if any. Bad or expired tokens are no session.
#[must_use]
pub fn current_session(codec: &SessionCodec, jar: &CookieJar) -> Option<Session> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| codec.decode(cookie.value()))
}

/// Require a session holding at least one of `allowed`.
///
/// `target` is the path (and query) being requested. Page requests are
/// redirected to the login page with `next` set to `target`, whether the
/// session is missing or merely lacks the role; API requests get 401 or 403.
///
/// # Errors
///
/// Returns the `AuthRejection` to send back when access is denied.
pub fn require_role(
    codec: &SessionCodec,
    jar: &CookieJar,
    allowed: &[Role],
    target: &str,
) -> Result<Session, AuthRejection> {
    let api = is_api(target);
    let reject = |api_rejection| {
        if api {
            api_rejection
        } else {
            AuthRejection::RedirectToLogin {
                next: target.to_owned(),
            }
        }
    };

    let session = current_session(codec, jar).ok_or_else(|| reject(AuthRejection::Unauthorized))?;
    if !session.has_any_role(allowed) {
        tracing::debug!(email = %session.email, path = target, "insufficient role");
        return Err(reject(AuthRejection::Forbidden));
    }
    Ok(session)
}

/// The set of roles a [`RequireRoles`] extractor accepts.
pub trait RolePolicy: Send + Sync {
    const ROLES: &'static [Role];
}

/// Admins only.
pub struct AdminOnly;

impl RolePolicy for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

/// Employees and admins.
pub struct StaffOnly;

impl RolePolicy for StaffOnly {
    const ROLES: &'static [Role] = &[Role::Employee, Role::Admin];
}

/// Extractor that requires a session with one of `P::ROLES`.
///
/// # Example
///
/// ```rust,ignore
/// async fn approve(RequireRoles(session, ..): RequireRoles<AdminOnly>) -> impl IntoResponse {
///     format!("Hello, {}!", session.name)
/// }
/// ```
pub struct RequireRoles<P: RolePolicy>(pub Session, pub PhantomData<P>);

impl<P: RolePolicy> FromRequestParts<AppState> for RequireRoles<P> {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let target = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path(), |pq| pq.as_str());

        let session = require_role(state.codec(), &jar, P::ROLES, target)?;
        Ok(Self(session, PhantomData))
    }
}

/// Extractor that optionally gets the current session.
///
/// Unlike `RequireRoles`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalSession(pub Option<Session>);

impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self(current_session(state.codec(), &jar)))
    }
}

fn base_cookie(config: &StorefrontConfig, name: &'static str, value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(config.secure_cookies());
    cookie.set_max_age(time::Duration::seconds(config.session_ttl_secs));
    cookie
}

/// Cookie holding a freshly encoded session token.
#[must_use]
pub fn session_cookie(config: &StorefrontConfig, token: String) -> Cookie<'static> {
    base_cookie(config, SESSION_COOKIE, token)
}

/// Cookie mirroring the session's roles, as a percent-encoded JSON array.
#[must_use]
pub fn roles_cookie(config: &StorefrontConfig, session: &Session) -> Cookie<'static> {
    let roles: Vec<&str> = session.roles.iter().map(|r| r.as_str()).collect();
    let json = serde_json::to_string(&roles).unwrap_or_else(|_| "[]".to_string());
    base_cookie(config, ROLES_COOKIE, urlencoding::encode(&json).into_owned())
}

/// Add both auth cookies to `jar`.
#[must_use]
pub fn set_auth_cookies(
    jar: CookieJar,
    config: &StorefrontConfig,
    session: &Session,
    token: String,
) -> CookieJar {
    jar.add(session_cookie(config, token))
        .add(roles_cookie(config, session))
}

/// Remove both auth cookies from `jar` (logout).
#[must_use]
pub fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(ROLES_COOKIE).path("/"))
}
