//! Staff sign-in, sign-out and login throttling over HTTP.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use reqwest::header::{LOCATION, SET_COOKIE};
use serde_json::Value;

use bubbling_bath_integration_tests::{
    ADMIN_EMAIL, ADMIN_PASSWORD, EMPLOYEE_EMAIL, EMPLOYEE_PASSWORD, TestApp, client,
};

async fn post_login(app: &TestApp, fields: &[(&str, &str)]) -> reqwest::Response {
    client()
        .post(app.url("/auth/login"))
        .form(fields)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_login_page_echoes_safe_next() {
    let app = TestApp::spawn().await;

    let body = client()
        .get(app.url("/auth/login?next=%2Fadmin%2Forders"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("orders"));

    let body = client()
        .get(app.url("/auth/login?next=https%3A%2F%2Fevil.test"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!body.contains("evil.test"));
}

#[tokio::test]
async fn test_admin_login_sets_cookies_and_redirects_home() {
    let app = TestApp::spawn().await;

    let response = post_login(
        &app,
        &[
            ("email", ADMIN_EMAIL),
            ("password", ADMIN_PASSWORD),
            ("workspace", "admin"),
        ],
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/admin");

    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert!(cookies.iter().any(|c| c.starts_with("bbd_session=")));
    assert!(cookies.iter().any(|c| c.starts_with("bbd_roles=")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly")));
}

#[tokio::test]
async fn test_session_endpoint_reports_signed_in_staff() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let session: Value = admin
        .get(app.url("/api/auth/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(session["email"], ADMIN_EMAIL);
    assert_eq!(session["workspace"], "admin");
    assert_eq!(session["roles"], serde_json::json!(["admin"]));
}

#[tokio::test]
async fn test_login_honours_next_but_not_offsite_targets() {
    let app = TestApp::spawn().await;

    let response = post_login(
        &app,
        &[
            ("email", ADMIN_EMAIL),
            ("password", ADMIN_PASSWORD),
            ("next", "/admin/orders?status=pending"),
        ],
    )
    .await;
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "/admin/orders?status=pending"
    );

    let response = post_login(
        &app,
        &[
            ("email", EMPLOYEE_EMAIL),
            ("password", EMPLOYEE_PASSWORD),
            ("next", "//evil.test/phish"),
        ],
    )
    .await;
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/employee");
}

#[tokio::test]
async fn test_failed_logins_are_indistinguishable() {
    let app = TestApp::spawn().await;

    let wrong_password = post_login(
        &app,
        &[
            ("email", ADMIN_EMAIL),
            ("password", "not-the-password"),
            ("workspace", "admin"),
        ],
    )
    .await;
    let unknown_user = post_login(
        &app,
        &[
            ("email", "ghost@bubblingbath.test"),
            ("password", ADMIN_PASSWORD),
            ("workspace", "admin"),
        ],
    )
    .await;
    // Employee credentials are not valid in the admin pool.
    let wrong_pool = post_login(
        &app,
        &[
            ("email", EMPLOYEE_EMAIL),
            ("password", EMPLOYEE_PASSWORD),
            ("workspace", "admin"),
        ],
    )
    .await;

    for response in [wrong_password, unknown_user, wrong_pool] {
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = response.text().await.unwrap();
        assert!(body.contains("Unable to authenticate"));
    }
}

#[tokio::test]
async fn test_logout_ends_the_session() {
    let app = TestApp::spawn().await;
    let employee = app.employee().await;

    let response = employee.post(app.url("/auth/logout")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(LOCATION).unwrap(), "/auth/login");

    let response = employee
        .get(app.url("/api/auth/session"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = employee.get(app.url("/employee")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = TestApp::spawn().await;
    let fields = [
        ("email", ADMIN_EMAIL),
        ("password", "guess"),
        ("workspace", "admin"),
    ];

    let mut statuses = Vec::new();
    for _ in 0..8 {
        statuses.push(post_login(&app, &fields).await.status());
    }

    assert_eq!(statuses.first(), Some(&StatusCode::UNAUTHORIZED));
    assert_eq!(statuses.last(), Some(&StatusCode::TOO_MANY_REQUESTS));

    // The login page itself is not throttled.
    let response = client().get(app.url("/auth/login")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
