//! HTTP handlers for purchases

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{CreatePurchaseInput, Purchase};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::PurchaseService;
use crate::AppState;

/// Query parameters for listing purchases
#[derive(Debug, Deserialize)]
pub struct ListPurchasesQuery {
    pub order_id: Option<Uuid>,
}

/// Invoice quantities against an order
pub async fn create_purchase(
    State(state): State<AppState>,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<Purchase>)> {
    let service = PurchaseService::new(state.store);
    let purchase = service.create_purchase(input).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn get_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<Purchase>> {
    let service = PurchaseService::new(state.store);
    Ok(Json(service.get_purchase(purchase_id)?))
}

pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<ListPurchasesQuery>,
) -> Json<Vec<Purchase>> {
    let service = PurchaseService::new(state.store);
    Json(service.list_purchases(query.order_id))
}

/// Delete a purchase and return its quantity to virtual inventory
pub async fn delete_purchase(
    State(state): State<AppState>,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = PurchaseService::new(state.store);
    service.delete_purchase(purchase_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
