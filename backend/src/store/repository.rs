//! Durable storage behind the store

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{ItemHistory, ItemHistoryQuery};

use super::{PoolRow, StoreState, Write};
use crate::error::AppResult;

/// Everything one committed operation writes
#[derive(Debug, Clone, Default)]
pub struct Changes {
    /// New absolute value of every pool the operation touched
    pub rows: Vec<PoolRow>,
    pub writes: Vec<Write>,
    pub history: Vec<ItemHistory>,
}

/// Durable home of documents, pools and item history
#[async_trait]
pub trait Repository: Send + Sync {
    /// Every document and pool, used to build the store at startup
    async fn load(&self) -> AppResult<StoreState>;

    /// Write one operation's changes atomically
    async fn persist(&self, changes: &Changes) -> AppResult<()>;

    /// History records matching a query, in commit order
    async fn history(&self, query: &ItemHistoryQuery) -> AppResult<Vec<ItemHistory>>;
}

#[derive(Debug, Default)]
struct MemoryData {
    state: StoreState,
    history: Vec<ItemHistory>,
}

/// Process-local repository for tests and database-less runs
#[derive(Debug, Default)]
pub struct MemoryRepository {
    data: Mutex<MemoryData>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn load(&self) -> AppResult<StoreState> {
        Ok(self.data.lock().state.clone())
    }

    async fn persist(&self, changes: &Changes) -> AppResult<()> {
        let mut data = self.data.lock();
        data.state.ledger.write_rows(&changes.rows);
        for write in &changes.writes {
            data.state.apply(write.clone());
        }
        data.history.extend(changes.history.iter().cloned());
        Ok(())
    }

    async fn history(&self, query: &ItemHistoryQuery) -> AppResult<Vec<ItemHistory>> {
        Ok(self
            .data
            .lock()
            .history
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}
