//! Order route handlers.
//!
//! Checkout is public. Approval, denial and refunds belong to admins; the
//! fulfilment team (employees and admins) reads orders and advances their
//! status.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use bubbling_bath_core::{OrderId, OrderStatus};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{AdminOnly, RequireRoles, StaffOnly};
use crate::models::{NewOrder, Order};
use crate::state::AppState;

/// Body for a denial.
#[derive(Debug, Deserialize)]
pub struct DenyRequest {
    #[serde(default)]
    pub reason: String,
}

/// Body for a refund.
#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Body for a fulfilment status change.
#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub status: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Place an order.
pub async fn checkout(
    State(state): State<AppState>,
    Json(input): Json<NewOrder>,
) -> Result<impl IntoResponse> {
    let order = state.orders().create(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Approve a pending order.
pub async fn approve(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    add_breadcrumb(
        "orders",
        "Approve order",
        Some(&[("order_id", id.as_str()), ("by", session.email.as_str())]),
    );
    Ok(Json(state.orders().approve(&id).await?))
}

/// Deny a pending order.
pub async fn deny(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<DenyRequest>,
) -> Result<Json<Order>> {
    add_breadcrumb(
        "orders",
        "Deny order",
        Some(&[("order_id", id.as_str()), ("by", session.email.as_str())]),
    );
    Ok(Json(state.orders().deny(&id, &request.reason).await?))
}

/// Refund an approved order.
pub async fn refund(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<Order>> {
    add_breadcrumb(
        "orders",
        "Refund order",
        Some(&[("order_id", id.as_str()), ("by", session.email.as_str())]),
    );
    let order = state.orders().refund(&id, request.note.as_deref()).await?;
    Ok(Json(order))
}

/// Order detail for the fulfilment team.
pub async fn detail(
    _: RequireRoles<StaffOnly>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(state.orders().get(&id).await?))
}

/// Move an order to a fulfilment status.
pub async fn advance_status(
    RequireRoles(session, ..): RequireRoles<StaffOnly>,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<Order>> {
    let status = request
        .status
        .parse::<OrderStatus>()
        .map_err(|e| AppError::Validation {
            field: "status",
            message: e.to_string(),
        })?;

    add_breadcrumb(
        "orders",
        "Advance order",
        Some(&[
            ("order_id", id.as_str()),
            ("status", status.as_str()),
            ("by", session.email.as_str()),
        ]),
    );
    let order = state
        .orders()
        .advance_status(&id, status, request.note.as_deref())
        .await?;
    Ok(Json(order))
}
