//! HTTP handlers for items, warehouses and parties

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{
    CreateItemInput, CreatePartyInput, CreateWarehouseInput, Item, Party, PartyKind, PoolSnapshot,
    Warehouse, WarehouseInventory,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::CatalogService;
use crate::AppState;

/// Query parameters for catalog listings
#[derive(Debug, Deserialize)]
pub struct OrganizationQuery {
    pub organization_id: Option<Uuid>,
}

/// Query parameters for a pool snapshot
#[derive(Debug, Deserialize)]
pub struct PickupQuery {
    pub pickup: Option<String>,
}

// ============================================================================
// Items
// ============================================================================

pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let service = CatalogService::new(state.store);
    let item = service.create_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<Item>> {
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_item(item_id)?))
}

pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<OrganizationQuery>,
) -> Json<Vec<Item>> {
    let service = CatalogService::new(state.store);
    Json(service.list_items(query.organization_id))
}

// ============================================================================
// Warehouses
// ============================================================================

pub async fn create_warehouse(
    State(state): State<AppState>,
    Json(input): Json<CreateWarehouseInput>,
) -> AppResult<(StatusCode, Json<Warehouse>)> {
    let service = CatalogService::new(state.store);
    let warehouse = service.create_warehouse(input).await?;
    Ok((StatusCode::CREATED, Json(warehouse)))
}

/// Get a warehouse with its virtual, billed and sold inventory
pub async fn get_warehouse(
    State(state): State<AppState>,
    Path(warehouse_id): Path<Uuid>,
) -> AppResult<Json<WarehouseInventory>> {
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_warehouse(warehouse_id)?))
}

pub async fn list_warehouses(
    State(state): State<AppState>,
    Query(query): Query<OrganizationQuery>,
) -> Json<Vec<Warehouse>> {
    let service = CatalogService::new(state.store);
    Json(service.list_warehouses(query.organization_id))
}

/// Get all four pools for one item at a warehouse
pub async fn get_pool_snapshot(
    State(state): State<AppState>,
    Path((warehouse_id, item_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<PickupQuery>,
) -> AppResult<Json<PoolSnapshot>> {
    let service = CatalogService::new(state.store);
    let snapshot = service.pool_snapshot(warehouse_id, item_id, query.pickup)?;
    Ok(Json(snapshot))
}

// ============================================================================
// Parties
// ============================================================================

async fn create_party(
    state: AppState,
    kind: PartyKind,
    input: CreatePartyInput,
) -> AppResult<(StatusCode, Json<Party>)> {
    let service = CatalogService::new(state.store);
    let party = service.create_party(kind, input).await?;
    Ok((StatusCode::CREATED, Json(party)))
}

pub async fn create_manufacturer(
    State(state): State<AppState>,
    Json(input): Json<CreatePartyInput>,
) -> AppResult<(StatusCode, Json<Party>)> {
    create_party(state, PartyKind::Manufacturer, input).await
}

pub async fn create_buyer(
    State(state): State<AppState>,
    Json(input): Json<CreatePartyInput>,
) -> AppResult<(StatusCode, Json<Party>)> {
    create_party(state, PartyKind::Buyer, input).await
}

pub async fn create_transporter(
    State(state): State<AppState>,
    Json(input): Json<CreatePartyInput>,
) -> AppResult<(StatusCode, Json<Party>)> {
    create_party(state, PartyKind::Transporter, input).await
}

pub async fn get_manufacturer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Party>> {
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_party(PartyKind::Manufacturer, id)?))
}

pub async fn get_buyer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Party>> {
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_party(PartyKind::Buyer, id)?))
}

pub async fn get_transporter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Party>> {
    let service = CatalogService::new(state.store);
    Ok(Json(service.get_party(PartyKind::Transporter, id)?))
}

pub async fn list_manufacturers(State(state): State<AppState>) -> Json<Vec<Party>> {
    Json(CatalogService::new(state.store).list_parties(PartyKind::Manufacturer))
}

pub async fn list_buyers(State(state): State<AppState>) -> Json<Vec<Party>> {
    Json(CatalogService::new(state.store).list_parties(PartyKind::Buyer))
}

pub async fn list_transporters(State(state): State<AppState>) -> Json<Vec<Party>> {
    Json(CatalogService::new(state.store).list_parties(PartyKind::Transporter))
}
