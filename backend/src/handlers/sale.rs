//! HTTP handlers for sales and total sales

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{CreateSaleInput, CreateTotalSaleInput, Sale, TotalSale};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::SaleService;
use crate::AppState;

/// Query parameters for listing sales
#[derive(Debug, Deserialize)]
pub struct ListSalesQuery {
    pub booking_id: Option<Uuid>,
}

/// Query parameters for listing total sales
#[derive(Debug, Deserialize)]
pub struct ListTotalSalesQuery {
    pub buyer_id: Option<Uuid>,
}

/// Deliver against one or more bookings
pub async fn create_sale(
    State(state): State<AppState>,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<Sale>)> {
    let service = SaleService::new(state.store);
    let sale = service.create_sale(input).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<Sale>> {
    let service = SaleService::new(state.store);
    Ok(Json(service.get_sale(sale_id)?))
}

pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<ListSalesQuery>,
) -> Json<Vec<Sale>> {
    let service = SaleService::new(state.store);
    Json(service.list_sales(query.booking_id))
}

/// Delete a sale and restore what it drained
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(sale_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = SaleService::new(state.store);
    service.delete_sale(sale_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_total_sale(
    State(state): State<AppState>,
    Json(input): Json<CreateTotalSaleInput>,
) -> AppResult<(StatusCode, Json<TotalSale>)> {
    let service = SaleService::new(state.store);
    let total_sale = service.create_total_sale(input).await?;
    Ok((StatusCode::CREATED, Json(total_sale)))
}

pub async fn get_total_sale(
    State(state): State<AppState>,
    Path(total_sale_id): Path<Uuid>,
) -> AppResult<Json<TotalSale>> {
    let service = SaleService::new(state.store);
    Ok(Json(service.get_total_sale(total_sale_id)?))
}

pub async fn list_total_sales(
    State(state): State<AppState>,
    Query(query): Query<ListTotalSalesQuery>,
) -> Json<Vec<TotalSale>> {
    let service = SaleService::new(state.store);
    Json(service.list_total_sales(query.buyer_id))
}
