//! Orders from checkout through approval, fulfilment and refund.

#![allow(clippy::unwrap_used)]
#![allow(clippy::indexing_slicing)]

use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};

use bubbling_bath_integration_tests::{LAVENDER, ROSE, TestApp, checkout_body, client};

fn money(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_checkout_creates_pending_order_with_totals() {
    let app = TestApp::spawn().await;

    let order = app.checkout(&[(LAVENDER, "12.50", 2), (ROSE, "8.00", 1)]).await;

    assert_eq!(order["status"], "pending");
    assert_eq!(money(&order["subtotal"]), Decimal::new(3300, 2));
    assert_eq!(money(&order["total"]), Decimal::new(3300, 2));
    assert_eq!(order["loyalty_points"], 33);
    assert_eq!(order["timeline"].as_array().unwrap().len(), 1);
    assert!(order["label"].is_null());

    // Checkout does not touch stock.
    assert_eq!(app.stock(LAVENDER).await, 5);
}

#[tokio::test]
async fn test_checkout_rejects_bad_payloads() {
    let app = TestApp::spawn().await;

    let response = client()
        .post(app.url("/api/orders"))
        .json(&checkout_body(&[]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "items");

    let response = client()
        .post(app.url("/api/orders"))
        .json(&checkout_body(&[(ROSE, "8.00", 0)]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // A line total past the decimal range is refused, not a crash.
    let response = client()
        .post(app.url("/api/orders"))
        .json(&checkout_body(&[(ROSE, "79228162514264337593543950335", 2)]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "unit_price");
}

#[tokio::test]
async fn test_full_fulfilment_flow() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let employee = app.employee().await;

    let order = app.checkout(&[(LAVENDER, "12.50", 2), (ROSE, "8.00", 3)]).await;
    let id = order["id"].as_str().unwrap();

    let response = admin
        .post(app.url(&format!("/api/admin/orders/{id}/approve")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let approved: Value = response.json().await.unwrap();
    assert_eq!(approved["status"], "approved");
    assert!(approved["label"].as_str().unwrap().starts_with("BBD-97201-POR-"));
    assert_eq!(app.stock(LAVENDER).await, 3);
    assert_eq!(app.stock(ROSE).await, 7);

    let mut last = approved;
    for status in ["processing", "ready", "shipped", "completed"] {
        let response = employee
            .post(app.url(&format!("/api/employee/orders/{id}/status")))
            .json(&json!({ "status": status, "note": format!("moved to {status}") }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{status}");
        last = response.json().await.unwrap();
        assert_eq!(last["status"], status);
    }

    let statuses: Vec<&str> = last["timeline"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status"].as_str().unwrap())
        .collect();
    assert_eq!(
        statuses,
        ["pending", "approved", "processing", "ready", "shipped", "completed"]
    );

    // Fulfilment never moves stock a second time.
    assert_eq!(app.stock(LAVENDER).await, 3);

    let sent = app.wait_for_notifications(6).await;
    assert!(sent.iter().all(|n| n.recipient.as_str() == "jo@example.test"));
    assert!(sent.iter().any(|n| n.subject.contains("approved")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approvals_decrement_stock_once() {
    let app = TestApp::spawn().await;
    let first = app.admin().await;
    let second = app.admin().await;

    let order = app.checkout(&[(ROSE, "8.00", 4)]).await;
    let url = app.url(&format!(
        "/api/admin/orders/{}/approve",
        order["id"].as_str().unwrap()
    ));

    let (a, b) = tokio::join!(first.post(&url).send(), second.post(&url).send());
    assert_eq!(a.unwrap().status(), StatusCode::OK);
    assert_eq!(b.unwrap().status(), StatusCode::OK);

    assert_eq!(app.stock(ROSE).await, 6);

    let history: Vec<Value> = first
        .get(app.url(&format!("/api/admin/products/{ROSE}/inventory")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["applied"], -4);
}

#[tokio::test]
async fn test_approval_clamps_stock_at_zero() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let order = app.checkout(&[(LAVENDER, "12.50", 7)]).await;
    let response = admin
        .post(app.url(&format!(
            "/api/admin/orders/{}/approve",
            order["id"].as_str().unwrap()
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.stock(LAVENDER).await, 0);
}

#[tokio::test]
async fn test_denied_order_cannot_be_approved() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let order = app.checkout(&[(ROSE, "8.00", 1)]).await;
    let id = order["id"].as_str().unwrap();

    let response = admin
        .post(app.url(&format!("/api/admin/orders/{id}/deny")))
        .json(&json!({ "reason": "payment declined" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let denied: Value = response.json().await.unwrap();
    assert_eq!(denied["status"], "denied");
    assert_eq!(denied["denial_reason"], "payment declined");

    let response = admin
        .post(app.url(&format!("/api/admin/orders/{id}/approve")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.stock(ROSE).await, 10);
}

#[tokio::test]
async fn test_refund_restocks_once() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let order = app.checkout(&[(LAVENDER, "12.50", 2)]).await;
    let id = order["id"].as_str().unwrap();
    admin
        .post(app.url(&format!("/api/admin/orders/{id}/approve")))
        .send()
        .await
        .unwrap();
    assert_eq!(app.stock(LAVENDER).await, 3);

    for _ in 0..2 {
        let response = admin
            .post(app.url(&format!("/api/admin/orders/{id}/refund")))
            .json(&json!({ "note": "arrived crushed" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let refunded: Value = response.json().await.unwrap();
        assert_eq!(refunded["status"], "refunded");
    }

    assert_eq!(app.stock(LAVENDER).await, 5);
}

#[tokio::test]
async fn test_fulfilment_rejects_gate_statuses_and_unknown_values() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;
    let employee = app.employee().await;

    let order = app.checkout(&[(ROSE, "8.00", 1)]).await;
    let id = order["id"].as_str().unwrap();
    admin
        .post(app.url(&format!("/api/admin/orders/{id}/approve")))
        .send()
        .await
        .unwrap();

    let status_url = app.url(&format!("/api/employee/orders/{id}/status"));

    let response = employee
        .post(&status_url)
        .json(&json!({ "status": "refunded" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = employee
        .post(&status_url)
        .json(&json!({ "status": "teleported" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["field"], "status");

    let response = employee
        .get(app.url("/api/employee/orders/no-such-order"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_pages_list_orders_by_status() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let pending = app.checkout(&[(ROSE, "8.00", 1)]).await;
    let approved = app.checkout(&[(LAVENDER, "12.50", 1)]).await;
    admin
        .post(app.url(&format!(
            "/api/admin/orders/{}/approve",
            approved["id"].as_str().unwrap()
        )))
        .send()
        .await
        .unwrap();

    let page = admin
        .get(app.url("/admin/orders?status=pending"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains(pending["id"].as_str().unwrap()));
    assert!(!page.contains(approved["id"].as_str().unwrap()));

    let queue = admin
        .get(app.url("/employee/orders"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(queue.contains(approved["id"].as_str().unwrap()));
    assert!(!queue.contains(pending["id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_admin_manages_catalog_and_stock() {
    let app = TestApp::spawn().await;
    let admin = app.admin().await;

    let response = admin
        .post(app.url("/api/admin/products"))
        .json(&json!({
            "name": "Winter Pine Melt",
            "sku": "BB-PINE-003",
            "price": "6.75",
            "inventory": 3,
            "category": "melts",
            "season": "winter"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let product: Value = response.json().await.unwrap();
    assert_eq!(product["id"], "bb-pine-003");

    let response = admin
        .post(app.url("/api/admin/products/bb-pine-003/inventory"))
        .json(&json!({ "delta": -10, "reason": "broken in storage" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let entry: Value = response.json().await.unwrap();
    assert_eq!(entry["stock_after"], 0);
    assert_eq!(entry["applied"], -3);

    let winter: Vec<Value> = client()
        .get(app.url("/api/products?season=winter"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(winter.len(), 1);

    let in_stock: Vec<Value> = client()
        .get(app.url("/api/products?in_stock=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(in_stock.len(), 2);

    // An edit that leaves stock out keeps what approvals left behind.
    let order = app.checkout(&[(LAVENDER, "12.50", 2)]).await;
    admin
        .post(app.url(&format!(
            "/api/admin/orders/{}/approve",
            order["id"].as_str().unwrap()
        )))
        .send()
        .await
        .unwrap();
    let response = admin
        .put(app.url(&format!("/api/admin/products/{LAVENDER}")))
        .json(&json!({
            "name": "Lavender Dream Bomb XL",
            "price": "13.00",
            "category": "bath-bombs",
            "season": "spring"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let edited: Value = response.json().await.unwrap();
    assert_eq!(edited["inventory"], 3);
    assert_eq!(app.stock(LAVENDER).await, 3);

    let response = admin
        .delete(app.url("/api/admin/products/bb-pine-003"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = client()
        .get(app.url("/api/products/bb-pine-003"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
