//! Document store and ledger transaction boundary
//!
//! Every document operation follows the same shape: compute the lock keys
//! it touches, acquire them, re-read state under the locks, validate, stage
//! a [`UnitOfWork`], then [`Store::commit`] it. Commit plans the ledger
//! adjustments all-or-nothing, persists the result through the
//! [`Repository`] in one transaction, and only then updates the in-memory
//! view, so a rejected or failed operation leaves no trace.
//!
//! The in-memory state is loaded from the repository at startup and is the
//! working set for reads. It assumes a single server process owns the
//! database.

pub mod ledger;
pub mod locks;
pub mod postgres;
pub mod repository;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    Booking, CreditNote, Item, ItemHistory, ItemHistoryQuery, ItemPrice, Order, Party, PartyKind,
    Pool, PoolKey, Purchase, Sale, TotalSale, Warehouse,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::{HistorySink, Notification, Notifier};

pub use ledger::{AdjustMode, Adjustment, InventoryLedger, LedgerError, PoolRow};
pub use locks::{LockConfig, LockError, LockKey, LockManager, LockSet};
pub use postgres::PgRepository;
pub use repository::{Changes, MemoryRepository, Repository};

/// What a sale does with quantity missing from the sold-billed pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Drain sold-virtual and billed, and return the shortfall to virtual
    #[default]
    RestoreVirtual,
    /// Drain sold-virtual and billed only
    DrainOnly,
}

impl ShortfallPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortfallPolicy::RestoreVirtual => "restore_virtual",
            ShortfallPolicy::DrainOnly => "drain_only",
        }
    }
}

impl std::fmt::Display for ShortfallPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// State
// ============================================================================

/// Every document and the inventory ledger
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub items: HashMap<Uuid, Item>,
    pub warehouses: HashMap<Uuid, Warehouse>,
    pub parties: HashMap<Uuid, Party>,
    pub prices: HashMap<(Uuid, Option<String>), ItemPrice>,
    pub orders: HashMap<Uuid, Order>,
    pub purchases: HashMap<Uuid, Purchase>,
    pub bookings: HashMap<Uuid, Booking>,
    pub sales: HashMap<Uuid, Sale>,
    pub total_sales: HashMap<Uuid, TotalSale>,
    pub credit_notes: HashMap<Uuid, CreditNote>,
    pub ledger: InventoryLedger,
}

impl StoreState {
    pub fn item(&self, id: Uuid) -> AppResult<&Item> {
        self.items
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Item {}", id)))
    }

    pub fn warehouse(&self, id: Uuid) -> AppResult<&Warehouse> {
        self.warehouses
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Warehouse {}", id)))
    }

    /// Look up a party and check it has the expected role
    pub fn party(&self, kind: PartyKind, id: Uuid) -> AppResult<&Party> {
        self.parties
            .get(&id)
            .filter(|p| p.kind == kind)
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind, id)))
    }

    pub fn order(&self, id: Uuid) -> AppResult<&Order> {
        self.orders
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Order {}", id)))
    }

    pub fn purchase(&self, id: Uuid) -> AppResult<&Purchase> {
        self.purchases
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Purchase {}", id)))
    }

    pub fn booking(&self, id: Uuid) -> AppResult<&Booking> {
        self.bookings
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", id)))
    }

    pub fn sale(&self, id: Uuid) -> AppResult<&Sale> {
        self.sales
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Sale {}", id)))
    }

    pub fn total_sale(&self, id: Uuid) -> AppResult<&TotalSale> {
        self.total_sales
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Total sale {}", id)))
    }

    pub fn credit_note(&self, id: Uuid) -> AppResult<&CreditNote> {
        self.credit_notes
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Credit note {}", id)))
    }

    /// Every purchase recorded against an order
    pub fn purchases_for_order(&self, order_id: Uuid) -> Vec<Purchase> {
        self.purchases
            .values()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Every sale with at least one line against a booking
    pub fn sales_for_booking(&self, booking_id: Uuid) -> Vec<Sale> {
        self.sales
            .values()
            .filter(|s| s.lines.iter().any(|l| l.booking_id == booking_id))
            .cloned()
            .collect()
    }

    /// Every credit note issued against a total sale
    pub fn credit_notes_for_total_sale(&self, total_sale_id: Uuid) -> Vec<CreditNote> {
        self.credit_notes
            .values()
            .filter(|n| n.total_sale_id == total_sale_id)
            .cloned()
            .collect()
    }

    /// Price book rate: the pickup-specific price, then the item default
    pub fn price_for(&self, item_id: Uuid, pickup: Option<&str>) -> Option<Decimal> {
        pickup
            .and_then(|p| self.prices.get(&(item_id, Some(p.to_string()))))
            .or_else(|| self.prices.get(&(item_id, None)))
            .map(|price| price.rate)
    }

    fn apply(&mut self, write: Write) {
        match write {
            Write::Item(item) => {
                self.items.insert(item.id, item);
            }
            Write::Warehouse(warehouse) => {
                self.warehouses.insert(warehouse.id, warehouse);
            }
            Write::Party(party) => {
                self.parties.insert(party.id, party);
            }
            Write::Price(price) => {
                self.prices
                    .insert((price.item_id, price.pickup.clone()), price);
            }
            Write::Order(order) => {
                self.orders.insert(order.id, order);
            }
            Write::RemoveOrder(id) => {
                self.orders.remove(&id);
            }
            Write::Purchase(purchase) => {
                self.purchases.insert(purchase.id, purchase);
            }
            Write::RemovePurchase(id) => {
                self.purchases.remove(&id);
            }
            Write::Booking(booking) => {
                self.bookings.insert(booking.id, booking);
            }
            Write::RemoveBooking(id) => {
                self.bookings.remove(&id);
            }
            Write::Sale(sale) => {
                self.sales.insert(sale.id, sale);
            }
            Write::RemoveSale(id) => {
                self.sales.remove(&id);
            }
            Write::TotalSale(total_sale) => {
                self.total_sales.insert(total_sale.id, total_sale);
            }
            Write::CreditNote(note) => {
                self.credit_notes.insert(note.id, note);
            }
        }
    }
}

// ============================================================================
// Unit of work
// ============================================================================

/// A document insert, replace or removal
#[derive(Debug, Clone)]
pub enum Write {
    Item(Item),
    Warehouse(Warehouse),
    Party(Party),
    Price(ItemPrice),
    Order(Order),
    RemoveOrder(Uuid),
    Purchase(Purchase),
    RemovePurchase(Uuid),
    Booking(Booking),
    RemoveBooking(Uuid),
    Sale(Sale),
    RemoveSale(Uuid),
    TotalSale(TotalSale),
    CreditNote(CreditNote),
}

impl Write {
    /// The lock that must be held to perform this write
    pub fn lock_key(&self) -> LockKey {
        match self {
            Write::Item(i) => LockKey::Item(i.id),
            Write::Warehouse(w) => LockKey::Warehouse(w.id),
            Write::Party(p) => LockKey::Party(p.id),
            Write::Price(p) => LockKey::Price(p.item_id),
            Write::Order(o) => LockKey::Order(o.id),
            Write::RemoveOrder(id) => LockKey::Order(*id),
            Write::Purchase(p) => LockKey::Purchase(p.id),
            Write::RemovePurchase(id) => LockKey::Purchase(*id),
            Write::Booking(b) => LockKey::Booking(b.id),
            Write::RemoveBooking(id) => LockKey::Booking(*id),
            Write::Sale(s) => LockKey::Sale(s.id),
            Write::RemoveSale(id) => LockKey::Sale(*id),
            Write::TotalSale(t) => LockKey::TotalSale(t.id),
            Write::CreditNote(n) => LockKey::CreditNote(n.id),
        }
    }
}

/// Everything one operation commits together
#[derive(Debug, Default)]
pub struct UnitOfWork {
    adjustments: Vec<Adjustment>,
    writes: Vec<Write>,
    history: Vec<ItemHistory>,
    notifications: Vec<Notification>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adjust(&mut self, adjustment: Adjustment) -> &mut Self {
        self.adjustments.push(adjustment);
        self
    }

    /// Add a strict adjustment, skipping zero deltas
    pub fn add_nonzero(&mut self, key: &PoolKey, pool: Pool, delta: Decimal) -> &mut Self {
        if delta > Decimal::ZERO {
            self.adjustments.push(Adjustment::add(key.clone(), pool, delta));
        } else if delta < Decimal::ZERO {
            self.adjustments.push(Adjustment::sub(key.clone(), pool, -delta));
        }
        self
    }

    pub fn write(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn record(&mut self, history: ItemHistory) -> &mut Self {
        self.history.push(history);
        self
    }

    pub fn notify(&mut self, notification: Notification) -> &mut Self {
        self.notifications.push(notification);
        self
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    /// Find the first write or adjustment whose key is not held
    fn unlocked_key(&self, locks: &LockSet) -> Option<LockKey> {
        self.writes
            .iter()
            .map(Write::lock_key)
            .chain(
                self.adjustments
                    .iter()
                    .map(|adj| LockKey::Pool(adj.key.clone())),
            )
            .find(|key| !locks.holds(key))
    }
}

// ============================================================================
// Store
// ============================================================================

/// Store settings taken from configuration
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    pub locks: LockConfig,
    pub shortfall_policy: ShortfallPolicy,
}

/// Document store with per-key transaction locking over a durable repository
pub struct Store {
    state: RwLock<StoreState>,
    locks: LockManager,
    shortfall_policy: ShortfallPolicy,
    repository: Arc<dyn Repository>,
    history_sink: Arc<dyn HistorySink>,
    notifier: Arc<dyn Notifier>,
}

impl Store {
    /// Load every document and pool from the repository
    pub async fn open(
        settings: StoreSettings,
        repository: Arc<dyn Repository>,
        history_sink: Arc<dyn HistorySink>,
        notifier: Arc<dyn Notifier>,
    ) -> AppResult<Self> {
        let state = repository.load().await?;
        tracing::info!(
            items = state.items.len(),
            warehouses = state.warehouses.len(),
            orders = state.orders.len(),
            bookings = state.bookings.len(),
            sales = state.sales.len(),
            "Store loaded"
        );

        Ok(Self {
            state: RwLock::new(state),
            locks: LockManager::new(settings.locks),
            shortfall_policy: settings.shortfall_policy,
            repository,
            history_sink,
            notifier,
        })
    }

    pub fn shortfall_policy(&self) -> ShortfallPolicy {
        self.shortfall_policy
    }

    /// Run a read-only closure against the current state
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.read())
    }

    /// Item history matching a query, oldest first
    pub async fn history(&self, query: &ItemHistoryQuery) -> AppResult<Vec<ItemHistory>> {
        self.repository.history(query).await
    }

    /// Acquire every key an operation will touch
    pub async fn lock<I>(&self, keys: I) -> AppResult<LockSet>
    where
        I: IntoIterator<Item = LockKey>,
    {
        Ok(self.locks.acquire(keys).await?)
    }

    /// Commit a unit of work under the given locks.
    ///
    /// The ledger result is planned against current state, persisted with
    /// the document writes and history in one repository transaction, then
    /// applied in memory. The held locks keep the planned pools stable
    /// between planning and applying. History forwarding and notifications
    /// run on their own tasks.
    pub async fn commit(&self, locks: &LockSet, uow: UnitOfWork) -> AppResult<()> {
        if let Some(key) = uow.unlocked_key(locks) {
            return Err(AppError::Internal(format!(
                "Commit touches {} without holding its lock",
                key
            )));
        }

        let UnitOfWork {
            adjustments,
            writes,
            history,
            notifications,
        } = uow;

        let rows = self.state.read().ledger.plan(&adjustments)?;
        let changes = Changes {
            rows,
            writes,
            history,
        };
        self.repository.persist(&changes).await?;

        let Changes {
            rows,
            writes,
            history,
        } = changes;
        {
            let mut state = self.state.write();
            state.ledger.write_rows(&rows);
            for write in writes {
                state.apply(write);
            }
        }

        if !history.is_empty() {
            let sink = self.history_sink.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.record(&history).await {
                    tracing::error!(records = history.len(), "Failed to forward item history: {}", e);
                }
            });
        }

        for notification in notifications {
            let notifier = self.notifier.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify(&notification).await {
                    tracing::error!(
                        transaction_id = %notification.transaction_id,
                        "Failed to send notification: {}",
                        e
                    );
                }
            });
        }

        Ok(())
    }
}
