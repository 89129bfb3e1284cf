//! HTTP handlers for item movement history

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{ItemHistory, ItemHistoryQuery};

use crate::error::AppResult;
use crate::services::ItemHistoryService;
use crate::AppState;

/// List movements filtered by item, warehouse or document
pub async fn list_item_history(
    State(state): State<AppState>,
    Query(query): Query<ItemHistoryQuery>,
) -> AppResult<Json<Vec<ItemHistory>>> {
    let service = ItemHistoryService::new(state.store);
    Ok(Json(service.query(&query).await?))
}
