//! Destinations for committed item history records
//!
//! The repository keeps the history that queries read. A sink receives a
//! copy of every committed batch, off the commit path, for audit logging or
//! downstream consumers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::ItemHistory;

use crate::error::AppResult;

/// Receiver of committed item history records
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, records: &[ItemHistory]) -> AppResult<()>;
}

/// Emits each record as a structured log event
#[derive(Debug, Clone, Default)]
pub struct TracingHistorySink;

#[async_trait]
impl HistorySink for TracingHistorySink {
    async fn record(&self, records: &[ItemHistory]) -> AppResult<()> {
        for record in records {
            tracing::info!(
                target: "item_history",
                item_id = %record.item_id,
                warehouse_id = %record.warehouse_id,
                source = %format!("{}:{}", record.source_kind.as_str(), record.source_id),
                destination = %format!("{}:{}", record.destination_kind.as_str(), record.destination_id),
                quantity = %record.quantity,
                "Item movement"
            );
        }
        Ok(())
    }
}

/// Keeps every forwarded record in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryHistorySink {
    records: Arc<Mutex<Vec<ItemHistory>>>,
}

impl MemoryHistorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ItemHistory> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl HistorySink for MemoryHistorySink {
    async fn record(&self, records: &[ItemHistory]) -> AppResult<()> {
        self.records.lock().extend_from_slice(records);
        Ok(())
    }
}
