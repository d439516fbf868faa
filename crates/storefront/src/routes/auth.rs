//! Authentication route handlers.
//!
//! Staff sign in against the admin or employee credential pool. A successful
//! login stamps the claims with the current time, signs them into the session
//! cookie and mirrors the roles into the role cookie for the edge filter.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use bubbling_bath_core::Workspace;

use crate::error::{AppError, LOGIN_FAILED_MESSAGE, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::auth::LOGIN_PATH;
use crate::middleware::{OptionalSession, clear_auth_cookies, set_auth_cookies};
use crate::models::Session;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Query parameters for the login page.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub workspace: Option<String>,
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub next: String,
    pub admin_selected: bool,
}

// =============================================================================
// Helpers
// =============================================================================

/// Accept only same-site relative return paths.
///
/// Anything that could leave the site (`//host`, `https://…`, backslashes)
/// is dropped.
#[must_use]
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.map(str::trim).filter(|n| {
        n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') && !n.contains("://")
    })
}

/// Pick the pool to check: the form's choice, else the one the return path
/// belongs to, else employee.
fn resolve_workspace(requested: Option<&str>, next: Option<&str>) -> Workspace {
    requested
        .and_then(|w| w.parse().ok())
        .unwrap_or_else(|| {
            if next.is_some_and(|n| n == "/admin" || n.starts_with("/admin/")) {
                Workspace::Admin
            } else {
                Workspace::Employee
            }
        })
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(Query(query): Query<LoginQuery>) -> impl IntoResponse {
    let next = safe_next(query.next.as_deref());
    LoginTemplate {
        error: None,
        next: next.unwrap_or_default().to_owned(),
        admin_selected: resolve_workspace(None, next) == Workspace::Admin,
    }
}

/// Handle login form submission.
///
/// Every failure, whatever the cause, renders the same message.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref());
    let workspace = resolve_workspace(form.workspace.as_deref(), next);

    let claims = state
        .auth()
        .authenticate(&form.email, &form.password, workspace)
        .await?;

    let Some(claims) = claims else {
        tracing::info!(workspace = %workspace, "login failed");
        let page = LoginTemplate {
            error: Some(LOGIN_FAILED_MESSAGE.to_owned()),
            next: next.unwrap_or_default().to_owned(),
            admin_selected: workspace == Workspace::Admin,
        };
        return Ok((StatusCode::UNAUTHORIZED, page).into_response());
    };

    let session = claims.issue(state.clock().unix_seconds());
    let token = state
        .codec()
        .encode(&session)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    set_sentry_user(session.email.as_str(), &session.name);
    tracing::info!(email = %session.email, workspace = %workspace, "staff signed in");

    let jar = set_auth_cookies(jar, state.config(), &session, token);
    let destination = next.unwrap_or_else(|| workspace.home_path());
    Ok((jar, Redirect::to(destination)).into_response())
}

/// Handle logout: clear both auth cookies.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    clear_sentry_user();
    (clear_auth_cookies(jar), Redirect::to(LOGIN_PATH))
}

/// The current session as JSON.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` when nobody is signed in.
pub async fn session_info(OptionalSession(session): OptionalSession) -> Result<Json<Session>> {
    session
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("no active session".to_string()))
}
