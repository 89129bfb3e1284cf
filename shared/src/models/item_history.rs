//! Item movement audit trail

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::EndpointKind;

/// One quantity movement between two endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemHistory {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub item_id: Uuid,
    pub pickup: Option<String>,
    /// Warehouse whose pools the movement touched
    pub warehouse_id: Uuid,
    pub source_kind: EndpointKind,
    pub source_id: Uuid,
    pub destination_kind: EndpointKind,
    pub destination_id: Uuid,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl ItemHistory {
    /// Whether this movement was caused by or delivered to the given document
    pub fn involves(&self, id: Uuid) -> bool {
        self.source_id == id || self.destination_id == id
    }
}

/// Filter for item history queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemHistoryQuery {
    pub item_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub document_id: Option<Uuid>,
}

impl ItemHistoryQuery {
    pub fn matches(&self, record: &ItemHistory) -> bool {
        self.item_id.map_or(true, |id| record.item_id == id)
            && self.warehouse_id.map_or(true, |id| record.warehouse_id == id)
            && self.document_id.map_or(true, |id| record.involves(id))
    }
}
