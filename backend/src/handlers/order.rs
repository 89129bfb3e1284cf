//! HTTP handlers for manufacturer orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{CreateOrderInput, Order};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::OrderService;
use crate::AppState;

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub organization_id: Option<Uuid>,
}

/// Create an order and add its quantities to virtual inventory
pub async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let service = OrderService::new(state.store);
    let order = service.create_order(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let service = OrderService::new(state.store);
    Ok(Json(service.get_order(order_id)?))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Json<Vec<Order>> {
    let service = OrderService::new(state.store);
    Json(service.list_orders(query.organization_id))
}

/// Delete an order without purchases
pub async fn delete_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = OrderService::new(state.store);
    service.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
