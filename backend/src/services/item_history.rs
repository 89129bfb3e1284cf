//! Item movement history queries

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{EndpointKind, ItemHistory, ItemHistoryQuery, PoolKey};
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::Store;

/// Build one history record for a movement at `key`
pub fn movement(
    organization_id: Uuid,
    key: &PoolKey,
    source: (EndpointKind, Uuid),
    destination: (EndpointKind, Uuid),
    quantity: Decimal,
    at: DateTime<Utc>,
) -> ItemHistory {
    ItemHistory {
        id: Uuid::new_v4(),
        organization_id,
        item_id: key.item_id,
        pickup: key.pickup.clone(),
        warehouse_id: key.warehouse_id,
        source_kind: source.0,
        source_id: source.1,
        destination_kind: destination.0,
        destination_id: destination.1,
        quantity,
        created_at: at,
    }
}

/// Read access to the append-only movement trail
#[derive(Clone)]
pub struct ItemHistoryService {
    store: Arc<Store>,
}

impl ItemHistoryService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Records matching the query, oldest first
    pub async fn query(&self, query: &ItemHistoryQuery) -> AppResult<Vec<ItemHistory>> {
        let records = self.store.history(query).await?;
        tracing::debug!(count = records.len(), "Item history queried");
        Ok(records)
    }

    /// Every movement caused by or delivered to one document
    pub async fn for_document(&self, document_id: Uuid) -> AppResult<Vec<ItemHistory>> {
        self.query(&ItemHistoryQuery {
            document_id: Some(document_id),
            ..Default::default()
        })
        .await
    }
}
