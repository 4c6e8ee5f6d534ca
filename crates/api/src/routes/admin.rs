//! Staff endpoints for the catalog, promotions and the kitchen workflow.
//!
//! Every handler requires [`StaffMember`]; bodies are JSON.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderStatus, ProductId, PromotionId};
use domain::ChangeStatus;
use serde::Deserialize;
use store::{
    Category, Order, Product, ProductDraft, Promotion, PromotionDraft, StatusChange, Store,
};

use crate::auth::StaffMember;
use crate::error::ApiError;
use crate::state::AppState;

use super::parse_order_id;

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromotionFilter {
    #[serde(default)]
    pub active: bool,
}

fn parse_product_id(raw: &str) -> Result<ProductId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Product {raw} not found")))
}

fn parse_promotion_id(raw: &str) -> Result<PromotionId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("Promotion {raw} not found")))
}

/// GET /admin/categories
pub async fn list_categories<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.catalog.list_categories().await?))
}

/// POST /admin/categories
#[tracing::instrument(skip(state, req))]
pub async fn create_category<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.catalog.create_category(&req.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /admin/products — every product, including inactive and sold out.
pub async fn list_products<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_products().await?))
}

/// POST /admin/products
#[tracing::instrument(skip(state, draft))]
pub async fn create_product<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create_product(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /admin/products/{id}
#[tracing::instrument(skip(state, draft))]
pub async fn update_product<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, ApiError> {
    let product_id = parse_product_id(&id)?;
    Ok(Json(state.catalog.update_product(product_id, draft).await?))
}

/// DELETE /admin/products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_product<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id = parse_product_id(&id)?;
    state.catalog.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/promotions?active=true
pub async fn list_promotions<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<PromotionFilter>,
) -> Result<Json<Vec<Promotion>>, ApiError> {
    Ok(Json(state.catalog.list_promotions(filter.active).await?))
}

/// POST /admin/promotions
#[tracing::instrument(skip(state, draft))]
pub async fn create_promotion<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<PromotionDraft>,
) -> Result<(StatusCode, Json<Promotion>), ApiError> {
    let promotion = state.catalog.create_promotion(draft).await?;
    Ok((StatusCode::CREATED, Json(promotion)))
}

/// GET /admin/promotions/{id}
pub async fn get_promotion<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Promotion>, ApiError> {
    let promotion_id = parse_promotion_id(&id)?;
    Ok(Json(state.catalog.get_promotion(promotion_id).await?))
}

/// PUT /admin/promotions/{id}
#[tracing::instrument(skip(state, draft))]
pub async fn update_promotion<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(draft): Json<PromotionDraft>,
) -> Result<Json<Promotion>, ApiError> {
    let promotion_id = parse_promotion_id(&id)?;
    Ok(Json(
        state.catalog.update_promotion(promotion_id, draft).await?,
    ))
}

/// POST /admin/orders/{id}/status — advance the order or cancel it.
#[tracing::instrument(skip(state, req), fields(status = %req.status))]
pub async fn change_status<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .change_status(ChangeStatus::new(order_id, req.status))
        .await?;
    Ok(Json(order))
}

/// POST /admin/orders/{id}/recalculate — reprice the order from its lines
/// with the promotions valid today.
#[tracing::instrument(skip(state))]
pub async fn recalculate<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orders.recalculate_total(order_id).await?))
}

/// GET /admin/orders/{id}/history
pub async fn history<S: Store>(
    _staff: StaffMember,
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.orders.history(order_id).await?))
}
