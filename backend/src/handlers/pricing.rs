//! HTTP handlers for the price book

use axum::{
    extract::{Path, Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{ItemPrice, SetItemPriceInput};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::PricingService;
use crate::AppState;

/// Query parameters for price listing
#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub item_id: Option<Uuid>,
}

/// Set the rate for an item, optionally for one pickup location
pub async fn set_price(
    State(state): State<AppState>,
    Json(input): Json<SetItemPriceInput>,
) -> AppResult<Json<ItemPrice>> {
    let service = PricingService::new(state.store);
    Ok(Json(service.set_price(input).await?))
}

pub async fn list_prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> Json<Vec<ItemPrice>> {
    let service = PricingService::new(state.store);
    Json(service.list_prices(query.item_id))
}

/// Query parameters for the effective rate lookup
#[derive(Debug, Deserialize)]
pub struct EffectiveRateQuery {
    pub pickup: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EffectiveRate {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub rate: Decimal,
}

/// Rate used for an item at a pickup location, falling back to the item default
pub async fn get_price(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<EffectiveRateQuery>,
) -> AppResult<Json<EffectiveRate>> {
    let service = PricingService::new(state.store);
    let rate = service.get_price(item_id, query.pickup.as_deref())?;
    Ok(Json(EffectiveRate {
        item_id,
        pickup: query.pickup,
        rate,
    }))
}
