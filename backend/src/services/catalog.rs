//! Catalog service for items, warehouses and trading parties

use std::sync::Arc;

use chrono::Utc;
use shared::{
    validate_tax_rate, CreateItemInput, CreatePartyInput, CreateWarehouseInput, Item, Party,
    PartyKind, PoolKey, PoolSnapshot, Warehouse, WarehouseInventory,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::store::{LockKey, Store, UnitOfWork, Write};

/// Catalog reference data; none of it touches the ledger
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<Store>,
}

impl CatalogService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    async fn save(&self, key: LockKey, write: Write) -> AppResult<()> {
        let locks = self.store.lock([key]).await?;
        let mut uow = UnitOfWork::new();
        uow.write(write);
        self.store.commit(&locks, uow).await
    }

    // ========================================================================
    // Items
    // ========================================================================

    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        input.validate()?;
        validate_tax_rate(input.tax_rate).map_err(|e| AppError::validation("tax_rate", e))?;

        let item = Item {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            name: input.name,
            hsn_code: input.hsn_code,
            weight_kg: input.weight_kg,
            packaging: input.packaging,
            tax_rate: input.tax_rate,
            created_at: Utc::now(),
        };

        self.save(LockKey::Item(item.id), Write::Item(item.clone()))
            .await?;

        tracing::info!(item_id = %item.id, name = %item.name, "Item created");
        Ok(item)
    }

    pub fn get_item(&self, id: Uuid) -> AppResult<Item> {
        self.store.read(|state| state.item(id).cloned())
    }

    pub fn list_items(&self, organization_id: Option<Uuid>) -> Vec<Item> {
        self.store.read(|state| {
            let mut items: Vec<Item> = state
                .items
                .values()
                .filter(|i| organization_id.map_or(true, |org| i.organization_id == org))
                .cloned()
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            items
        })
    }

    // ========================================================================
    // Warehouses
    // ========================================================================

    pub async fn create_warehouse(&self, input: CreateWarehouseInput) -> AppResult<Warehouse> {
        input.validate()?;

        let warehouse = Warehouse {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            name: input.name,
            address: input.address,
            created_at: Utc::now(),
        };

        self.save(
            LockKey::Warehouse(warehouse.id),
            Write::Warehouse(warehouse.clone()),
        )
        .await?;

        tracing::info!(warehouse_id = %warehouse.id, name = %warehouse.name, "Warehouse created");
        Ok(warehouse)
    }

    /// The warehouse with its pools rendered as embedded inventory arrays
    pub fn get_warehouse(&self, id: Uuid) -> AppResult<WarehouseInventory> {
        self.store.read(|state| {
            let warehouse = state.warehouse(id)?.clone();
            let (virtual_inventory, billed_inventory, sold_inventory) =
                state.ledger.warehouse_view(id);
            Ok(WarehouseInventory {
                warehouse,
                virtual_inventory,
                billed_inventory,
                sold_inventory,
            })
        })
    }

    pub fn list_warehouses(&self, organization_id: Option<Uuid>) -> Vec<Warehouse> {
        self.store.read(|state| {
            let mut warehouses: Vec<Warehouse> = state
                .warehouses
                .values()
                .filter(|w| organization_id.map_or(true, |org| w.organization_id == org))
                .cloned()
                .collect();
            warehouses.sort_by(|a, b| a.name.cmp(&b.name));
            warehouses
        })
    }

    /// Consistent read of every pool for one item at one warehouse
    pub fn pool_snapshot(
        &self,
        warehouse_id: Uuid,
        item_id: Uuid,
        pickup: Option<String>,
    ) -> AppResult<PoolSnapshot> {
        self.store.read(|state| {
            state.warehouse(warehouse_id)?;
            state.item(item_id)?;
            Ok(state
                .ledger
                .snapshot(&PoolKey::new(warehouse_id, item_id, pickup)))
        })
    }

    // ========================================================================
    // Parties
    // ========================================================================

    pub async fn create_party(&self, kind: PartyKind, input: CreatePartyInput) -> AppResult<Party> {
        input.validate()?;

        let party = Party {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            kind,
            name: input.name,
            email: input.email,
            phone: input.phone,
            gst_number: input.gst_number,
            created_at: Utc::now(),
        };

        self.save(LockKey::Party(party.id), Write::Party(party.clone()))
            .await?;

        tracing::info!(party_id = %party.id, kind = %kind, "Party created");
        Ok(party)
    }

    pub fn get_party(&self, kind: PartyKind, id: Uuid) -> AppResult<Party> {
        self.store.read(|state| state.party(kind, id).cloned())
    }

    pub fn list_parties(&self, kind: PartyKind) -> Vec<Party> {
        self.store.read(|state| {
            let mut parties: Vec<Party> = state
                .parties
                .values()
                .filter(|p| p.kind == kind)
                .cloned()
                .collect();
            parties.sort_by(|a, b| a.name.cmp(&b.name));
            parties
        })
    }
}
