//! Product route handlers.
//!
//! The catalog is public. Creating, replacing and deleting products and
//! touching stock directly is admin-only.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use bubbling_bath_core::{ProductId, Season};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{AdminOnly, RequireRoles};
use crate::models::{LedgerEntry, Product, ProductInput};
use crate::state::AppState;

/// Catalog filters.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub season: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub in_stock: bool,
}

/// Manual stock adjustment.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: i64,
    pub reason: String,
}

fn not_found(id: &ProductId) -> AppError {
    AppError::NotFound(format!("product {id}"))
}

// =============================================================================
// Public catalog
// =============================================================================

/// List products, optionally filtered.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<Product>>> {
    let season = query
        .season
        .as_deref()
        .map(str::parse::<Season>)
        .transpose()
        .map_err(|e| AppError::Validation {
            field: "season",
            message: e.to_string(),
        })?;
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());

    let products = state
        .store()
        .list_products()
        .await?
        .into_iter()
        .filter(|p| season.is_none_or(|s| p.season == s))
        .filter(|p| category.is_none_or(|c| p.category.eq_ignore_ascii_case(c)))
        .filter(|p| !query.in_stock || p.inventory > 0)
        .collect();

    Ok(Json(products))
}

/// Show one product.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .store()
        .get_product(&id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

// =============================================================================
// Admin
// =============================================================================

/// Create a product.
pub async fn create(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse> {
    let product = input.into_new_product(state.clock().now())?;
    let product = state.store().insert_product(product).await?;

    tracing::info!(product_id = %product.id, by = %session.email, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's details.
pub async fn update(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    let product = state
        .store()
        .update_product(&id, input)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => not_found(&id),
            other => other,
        })?;

    tracing::info!(product_id = %product.id, by = %session.email, "product updated");
    Ok(Json(product))
}

/// Delete a product.
pub async fn delete(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    state
        .store()
        .delete_product(&id)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::NotFound(_) => not_found(&id),
            other => other,
        })?;

    tracing::info!(product_id = %id, by = %session.email, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Ledger entries for a product.
pub async fn inventory_history(
    _: RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Vec<LedgerEntry>>> {
    Ok(Json(state.inventory().history(&id).await?))
}

/// Adjust a product's stock by hand.
pub async fn adjust_inventory(
    RequireRoles(session, ..): RequireRoles<AdminOnly>,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<LedgerEntry>> {
    add_breadcrumb(
        "inventory",
        "Adjusted stock",
        Some(&[("product_id", id.as_str()), ("by", session.email.as_str())]),
    );
    let entry = state
        .inventory()
        .adjust(&id, request.delta, &request.reason)
        .await?;
    Ok(Json(entry))
}
