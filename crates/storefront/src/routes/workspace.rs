//! Staff workspace pages.
//!
//! `/admin/*` and `/employee/*` sit behind the role-cookie edge filter and
//! also check the signed session through [`RequireRoles`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;

use bubbling_bath_core::OrderStatus;

use crate::error::{AppError, Result};
use crate::middleware::{AdminOnly, RequireRoles, StaffOnly};
use crate::models::Order;
use crate::state::AppState;

/// How many orders the dashboard shows.
const DASHBOARD_ORDERS: usize = 10;

/// Order display data for templates.
#[derive(Clone)]
pub struct OrderView {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub item_count: u32,
    pub total: String,
    pub placed_at: String,
    pub label: Option<String>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            customer: order.customer.name.clone(),
            status: order.status.to_string(),
            item_count: order.items.iter().map(|i| i.quantity).sum(),
            total: order.total.to_string(),
            placed_at: order.created_at.format("%Y-%m-%d %H:%M").to_string(),
            label: order.label.clone(),
        }
    }
}

/// Status filter link.
#[derive(Clone)]
pub struct StatusLink {
    pub status: &'static str,
    pub current: bool,
}

/// Order list filter.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<String>,
}

/// Admin dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub staff_name: String,
    pub pending: usize,
    pub in_fulfilment: usize,
    pub product_count: usize,
    pub out_of_stock: usize,
    pub orders: Vec<OrderView>,
}

/// Admin order list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/orders.html")]
pub struct OrdersTemplate {
    pub staff_name: String,
    pub status_links: Vec<StatusLink>,
    pub orders: Vec<OrderView>,
}

/// Fulfilment queue template.
#[derive(Template, WebTemplate)]
#[template(path = "employee/queue.html")]
pub struct QueueTemplate {
    pub staff_name: String,
    pub orders: Vec<OrderView>,
}

/// Admin dashboard.
pub async fn admin_dashboard(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let orders = state.orders().list(None).await?;
    let products = state.store().list_products().await?;

    let pending = orders
        .iter()
        .filter(|o| o.status == OrderStatus::Pending)
        .count();
    let in_fulfilment = orders
        .iter()
        .filter(|o| o.status.is_past_approval() && o.status != OrderStatus::Completed)
        .count();

    Ok(DashboardTemplate {
        staff_name: session.name,
        pending,
        in_fulfilment,
        product_count: products.len(),
        out_of_stock: products.iter().filter(|p| p.inventory == 0).count(),
        orders: orders.iter().take(DASHBOARD_ORDERS).map(OrderView::from).collect(),
    })
}

/// Admin order list, optionally filtered by status.
pub async fn admin_orders(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse> {
    let filter = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let orders = state.orders().list(filter).await?;

    Ok(OrdersTemplate {
        staff_name: session.name,
        status_links: OrderStatus::ALL
            .iter()
            .map(|s| StatusLink {
                status: s.as_str(),
                current: filter == Some(*s),
            })
            .collect(),
        orders: orders.iter().map(OrderView::from).collect(),
    })
}

/// Fulfilment queue: approved orders not yet completed.
pub async fn employee_queue(
    RequireRoles(session, ..): RequireRoles<StaffOnly>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let orders = state.orders().fulfilment_queue().await?;

    Ok(QueueTemplate {
        staff_name: session.name,
        orders: orders.iter().map(OrderView::from).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use askama::Template;

    use super::*;

    fn view(id: &str, label: Option<&str>) -> OrderView {
        OrderView {
            id: id.to_owned(),
            customer: "Maya".to_owned(),
            status: "approved".to_owned(),
            item_count: 3,
            total: "$20.00".to_owned(),
            placed_at: "2026-03-01 09:30".to_owned(),
            label: label.map(str::to_owned),
        }
    }

    #[test]
    fn test_queue_renders_labels() {
        let html = QueueTemplate {
            staff_name: "Sam".to_owned(),
            orders: vec![view("ord_1", Some("BBD-97201-POR-1")), view("ord_2", None)],
        }
        .render()
        .unwrap();

        assert!(html.contains("ord_1"));
        assert!(html.contains("BBD-97201-POR-1"));
        assert!(html.contains("ord_2"));
    }

    #[test]
    fn test_empty_queue_message() {
        let html = QueueTemplate {
            staff_name: "Sam".to_owned(),
            orders: Vec::new(),
        }
        .render()
        .unwrap();
        assert!(html.contains("Nothing to fulfil."));
    }
}
