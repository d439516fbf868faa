//! Workspace access control: the edge filter on page prefixes and the
//! session role check behind it.

#![allow(clippy::unwrap_used)]

use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, COOKIE, LOCATION, X_FRAME_OPTIONS};

use bubbling_bath_integration_tests::{TestApp, client};

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::spawn().await;

    let response = client().get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");

    let response = client().get(app.url("/health/ready")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_workspace_requests_redirect_to_login() {
    let app = TestApp::spawn().await;

    for (path, next) in [
        ("/admin", "%2Fadmin"),
        ("/admin/orders?status=pending", "%2Fadmin%2Forders%3Fstatus%3Dpending"),
        ("/employee/orders", "%2Femployee%2Forders"),
        ("/customer", "%2Fcustomer"),
    ] {
        let response = client().get(app.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{path}");
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            format!("/auth/login?next={next}").as_str(),
        );
    }
}

#[tokio::test]
async fn test_prefix_match_stops_at_segment_boundary() {
    let app = TestApp::spawn().await;

    // Not under `/admin`, so the edge filter lets it through to a 404.
    let response = client().get(app.url("/administrator")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_employee_is_kept_out_of_admin_pages() {
    let app = TestApp::spawn().await;
    let employee = app.employee().await;

    let response = employee.get(app.url("/employee")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Fulfilment queue"));

    let response = employee.get(app.url("/admin/orders")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "/auth/login?next=%2Fadmin%2Forders"
    );
}

#[tokio::test]
async fn test_admin_reaches_both_workspaces() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let response = admin.get(app.url("/admin")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Dashboard"));

    let response = admin.get(app.url("/admin/orders?status=pending")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = admin.get(app.url("/employee/orders")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forged_role_cookie_without_session_is_rejected() {
    let app = TestApp::spawn().await;
    let forged = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = forged
        .get(app.url("/admin"))
        .header(COOKIE, "bbd_roles=%5B%22admin%22%5D")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "/auth/login?next=%2Fadmin"
    );

    let response = forged
        .post(app.url("/api/admin/orders/anything/approve"))
        .header(COOKIE, "bbd_roles=admin")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_rejects_with_status_codes() {
    let app = TestApp::spawn().await;
    let order = app.checkout(&[(bubbling_bath_integration_tests::ROSE, "8.00", 1)]).await;
    let id = order["id"].as_str().unwrap();
    let approve = format!("/api/admin/orders/{id}/approve");

    let response = client().post(app.url(&approve)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let employee = app.employee().await;
    let response = employee.post(app.url(&approve)).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = client()
        .get(app.url(&format!("/api/employee/orders/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = employee
        .get(app.url(&format!("/api/employee/orders/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let app = TestApp::spawn().await;

    let response = client()
        .get(app.url("/api/products"))
        .header("x-request-id", "req-guard-1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get(X_FRAME_OPTIONS).unwrap(), "DENY");
    assert!(response.headers().get(CACHE_CONTROL).is_some());
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-guard-1");

    // Redirects from the edge filter still get an id.
    let response = client().get(app.url("/admin")).send().await.unwrap();
    assert!(response.headers().get("x-request-id").is_some());
}
