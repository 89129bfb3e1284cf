//! Inventory pool models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Warehouse;
use crate::types::{Pool, PoolKey};

/// A single `(item, pickup, quantity)` tuple in a virtual or billed pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryEntry {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
}

/// Sold inventory, split by the pool backing the buyer commitment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoldInventoryEntry {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub virtual_quantity: Decimal,
    pub billed_quantity: Decimal,
}

/// Consistent read of every pool for one ledger key.
///
/// Missing entries read as zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolSnapshot {
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub virtual_quantity: Decimal,
    pub billed_quantity: Decimal,
    pub sold_virtual_quantity: Decimal,
    pub sold_billed_quantity: Decimal,
}

impl PoolSnapshot {
    pub fn empty(key: &PoolKey) -> Self {
        Self {
            warehouse_id: key.warehouse_id,
            item_id: key.item_id,
            pickup: key.pickup.clone(),
            virtual_quantity: Decimal::ZERO,
            billed_quantity: Decimal::ZERO,
            sold_virtual_quantity: Decimal::ZERO,
            sold_billed_quantity: Decimal::ZERO,
        }
    }

    pub fn get(&self, pool: Pool) -> Decimal {
        match pool {
            Pool::Virtual => self.virtual_quantity,
            Pool::Billed => self.billed_quantity,
            Pool::SoldVirtual => self.sold_virtual_quantity,
            Pool::SoldBilled => self.sold_billed_quantity,
        }
    }

    /// Sum of all pools, the quantity conserved by the pipelines
    pub fn total(&self) -> Decimal {
        self.virtual_quantity
            + self.billed_quantity
            + self.sold_virtual_quantity
            + self.sold_billed_quantity
    }
}

/// Warehouse document with its three embedded inventory arrays
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseInventory {
    #[serde(flatten)]
    pub warehouse: Warehouse,
    pub virtual_inventory: Vec<InventoryEntry>,
    pub billed_inventory: Vec<InventoryEntry>,
    pub sold_inventory: Vec<SoldInventoryEntry>,
}
