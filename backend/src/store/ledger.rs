//! Inventory ledger: quantity pools keyed by warehouse, item and pickup
//!
//! The ledger knows nothing about documents. It applies sets of signed
//! adjustments all-or-nothing and refuses any set that would leave a pool
//! negative.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use shared::{InventoryEntry, Pool, PoolKey, PoolSnapshot, SoldInventoryEntry};
use thiserror::Error;
use uuid::Uuid;

/// Ledger failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("insufficient {pool} quantity at {key}: requested {requested}, available {available}")]
    Insufficient {
        key: PoolKey,
        pool: Pool,
        requested: Decimal,
        available: Decimal,
    },
}

/// How an adjustment treats a result below zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustMode {
    /// Reject the whole set
    Strict,
    /// Clamp at zero
    Saturating,
}

/// One signed change to one pool
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub key: PoolKey,
    pub pool: Pool,
    pub delta: Decimal,
    pub mode: AdjustMode,
}

impl Adjustment {
    pub fn add(key: PoolKey, pool: Pool, quantity: Decimal) -> Self {
        Self {
            key,
            pool,
            delta: quantity,
            mode: AdjustMode::Strict,
        }
    }

    pub fn sub(key: PoolKey, pool: Pool, quantity: Decimal) -> Self {
        Self {
            key,
            pool,
            delta: -quantity,
            mode: AdjustMode::Strict,
        }
    }

    pub fn sub_saturating(key: PoolKey, pool: Pool, quantity: Decimal) -> Self {
        Self {
            key,
            pool,
            delta: -quantity,
            mode: AdjustMode::Saturating,
        }
    }

    /// Materialize a zero entry if the pool has none
    pub fn ensure(key: PoolKey, pool: Pool) -> Self {
        Self::add(key, pool, Decimal::ZERO)
    }
}

/// The value of one pool after a set of adjustments
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRow {
    pub key: PoolKey,
    pub pool: Pool,
    pub quantity: Decimal,
}

/// The pools of every warehouse.
///
/// A slot absent from the map reads as zero. Slots are only created by
/// adjustments, so the warehouse view lists exactly the entries that some
/// document touched.
#[derive(Debug, Clone, Default)]
pub struct InventoryLedger {
    slots: BTreeMap<(PoolKey, Pool), Decimal>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current quantity of one pool
    pub fn quantity(&self, key: &PoolKey, pool: Pool) -> Decimal {
        self.slots
            .get(&(key.clone(), pool))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Whether the pool has a materialized entry
    pub fn has_entry(&self, key: &PoolKey, pool: Pool) -> bool {
        self.slots.contains_key(&(key.clone(), pool))
    }

    /// Compute the result of `adjustments` without touching the ledger
    fn stage(
        &self,
        adjustments: &[Adjustment],
    ) -> Result<BTreeMap<(PoolKey, Pool), Decimal>, LedgerError> {
        let mut staged: BTreeMap<(PoolKey, Pool), Decimal> = BTreeMap::new();

        for adj in adjustments {
            let slot = (adj.key.clone(), adj.pool);
            let current = staged
                .get(&slot)
                .or_else(|| self.slots.get(&slot))
                .copied()
                .unwrap_or(Decimal::ZERO);
            let next = current + adj.delta;

            let next = match adj.mode {
                AdjustMode::Strict if next < Decimal::ZERO => {
                    return Err(LedgerError::Insufficient {
                        key: adj.key.clone(),
                        pool: adj.pool,
                        requested: -adj.delta,
                        available: current,
                    });
                }
                AdjustMode::Strict => next,
                AdjustMode::Saturating => next.max(Decimal::ZERO),
            };

            staged.insert(slot, next);
        }

        Ok(staged)
    }

    /// Check a set of adjustments without applying it
    pub fn check(&self, adjustments: &[Adjustment]) -> Result<(), LedgerError> {
        self.stage(adjustments).map(|_| ())
    }

    /// Resulting value of every pool a set of adjustments touches
    pub fn plan(&self, adjustments: &[Adjustment]) -> Result<Vec<PoolRow>, LedgerError> {
        Ok(self
            .stage(adjustments)?
            .into_iter()
            .map(|((key, pool), quantity)| PoolRow {
                key,
                pool,
                quantity,
            })
            .collect())
    }

    /// Overwrite pools with planned or loaded values
    pub fn write_rows(&mut self, rows: &[PoolRow]) {
        for row in rows {
            self.slots
                .insert((row.key.clone(), row.pool), row.quantity);
        }
    }

    /// Apply a set of adjustments all-or-nothing
    pub fn apply(&mut self, adjustments: &[Adjustment]) -> Result<(), LedgerError> {
        let staged = self.stage(adjustments)?;
        self.slots.extend(staged);
        Ok(())
    }

    /// Read every pool for one key
    pub fn snapshot(&self, key: &PoolKey) -> PoolSnapshot {
        let mut snapshot = PoolSnapshot::empty(key);
        snapshot.virtual_quantity = self.quantity(key, Pool::Virtual);
        snapshot.billed_quantity = self.quantity(key, Pool::Billed);
        snapshot.sold_virtual_quantity = self.quantity(key, Pool::SoldVirtual);
        snapshot.sold_billed_quantity = self.quantity(key, Pool::SoldBilled);
        snapshot
    }

    /// Render the three embedded inventory arrays of one warehouse
    pub fn warehouse_view(
        &self,
        warehouse_id: Uuid,
    ) -> (
        Vec<InventoryEntry>,
        Vec<InventoryEntry>,
        Vec<SoldInventoryEntry>,
    ) {
        let mut virtual_inventory = Vec::new();
        let mut billed_inventory = Vec::new();
        let mut sold: BTreeMap<PoolKey, SoldInventoryEntry> = BTreeMap::new();

        for ((key, pool), quantity) in self
            .slots
            .iter()
            .filter(|((key, _), _)| key.warehouse_id == warehouse_id)
        {
            let entry = || InventoryEntry {
                item_id: key.item_id,
                pickup: key.pickup.clone(),
                quantity: *quantity,
            };
            match pool {
                Pool::Virtual => virtual_inventory.push(entry()),
                Pool::Billed => billed_inventory.push(entry()),
                Pool::SoldVirtual | Pool::SoldBilled => {
                    let sold_entry =
                        sold.entry(key.clone())
                            .or_insert_with(|| SoldInventoryEntry {
                                item_id: key.item_id,
                                pickup: key.pickup.clone(),
                                virtual_quantity: Decimal::ZERO,
                                billed_quantity: Decimal::ZERO,
                            });
                    if *pool == Pool::SoldVirtual {
                        sold_entry.virtual_quantity = *quantity;
                    } else {
                        sold_entry.billed_quantity = *quantity;
                    }
                }
            }
        }

        (virtual_inventory, billed_inventory, sold.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> PoolKey {
        PoolKey::new(Uuid::from_u128(1), Uuid::from_u128(2), None)
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_missing_entry_reads_zero() {
        let ledger = InventoryLedger::new();
        assert_eq!(ledger.quantity(&key(), Pool::Billed), Decimal::ZERO);
        assert!(!ledger.has_entry(&key(), Pool::Billed));
        assert_eq!(ledger.snapshot(&key()).total(), Decimal::ZERO);
    }

    #[test]
    fn test_ensure_materializes_zero_entry() {
        let mut ledger = InventoryLedger::new();
        ledger.apply(&[Adjustment::ensure(key(), Pool::Billed)]).unwrap();
        assert!(ledger.has_entry(&key(), Pool::Billed));
        let (_, billed, _) = ledger.warehouse_view(key().warehouse_id);
        assert_eq!(billed.len(), 1);
        assert_eq!(billed[0].quantity, Decimal::ZERO);
    }

    #[test]
    fn test_rejected_set_leaves_no_trace() {
        let mut ledger = InventoryLedger::new();
        ledger
            .apply(&[Adjustment::add(key(), Pool::Virtual, dec(10))])
            .unwrap();

        let other = PoolKey::new(Uuid::from_u128(1), Uuid::from_u128(3), None);
        let err = ledger
            .apply(&[
                Adjustment::add(other.clone(), Pool::Billed, dec(5)),
                Adjustment::sub(key(), Pool::Virtual, dec(11)),
            ])
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::Insufficient {
                key: key(),
                pool: Pool::Virtual,
                requested: dec(11),
                available: dec(10),
            }
        );
        assert_eq!(ledger.quantity(&key(), Pool::Virtual), dec(10));
        assert!(!ledger.has_entry(&other, Pool::Billed));
    }

    #[test]
    fn test_adjustments_on_same_slot_accumulate() {
        let mut ledger = InventoryLedger::new();
        ledger
            .apply(&[
                Adjustment::add(key(), Pool::Billed, dec(4)),
                Adjustment::sub(key(), Pool::Billed, dec(3)),
                Adjustment::sub(key(), Pool::Billed, dec(1)),
            ])
            .unwrap();
        assert_eq!(ledger.quantity(&key(), Pool::Billed), Decimal::ZERO);

        let err = ledger
            .check(&[
                Adjustment::add(key(), Pool::Billed, dec(2)),
                Adjustment::sub(key(), Pool::Billed, dec(3)),
            ])
            .unwrap_err();
        assert!(matches!(err, LedgerError::Insufficient { available, .. } if available == dec(2)));
    }

    #[test]
    fn test_saturating_clamps_at_zero() {
        let mut ledger = InventoryLedger::new();
        ledger
            .apply(&[Adjustment::add(key(), Pool::Virtual, dec(5))])
            .unwrap();
        ledger
            .apply(&[Adjustment::sub_saturating(key(), Pool::Virtual, dec(8))])
            .unwrap();
        assert_eq!(ledger.quantity(&key(), Pool::Virtual), Decimal::ZERO);
    }

    #[test]
    fn test_warehouse_view_combines_sold_split() {
        let mut ledger = InventoryLedger::new();
        ledger
            .apply(&[
                Adjustment::add(key(), Pool::SoldVirtual, dec(3)),
                Adjustment::add(key(), Pool::SoldBilled, dec(4)),
                Adjustment::add(
                    PoolKey::new(Uuid::from_u128(9), Uuid::from_u128(2), None),
                    Pool::Virtual,
                    dec(1),
                ),
            ])
            .unwrap();

        let (virtual_inventory, _, sold) = ledger.warehouse_view(key().warehouse_id);
        assert!(virtual_inventory.is_empty());
        assert_eq!(sold.len(), 1);
        assert_eq!(sold[0].virtual_quantity, dec(3));
        assert_eq!(sold[0].billed_quantity, dec(4));
    }

    #[test]
    fn test_plan_leaves_ledger_untouched() {
        let mut ledger = InventoryLedger::new();
        ledger
            .apply(&[Adjustment::add(key(), Pool::Virtual, dec(10))])
            .unwrap();

        let rows = ledger
            .plan(&[
                Adjustment::sub(key(), Pool::Virtual, dec(4)),
                Adjustment::add(key(), Pool::Billed, dec(4)),
            ])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(ledger.quantity(&key(), Pool::Virtual), dec(10));

        let mut copy = InventoryLedger::new();
        copy.write_rows(&rows);
        assert_eq!(copy.quantity(&key(), Pool::Virtual), dec(6));
        assert_eq!(copy.quantity(&key(), Pool::Billed), dec(4));
    }

    fn adjustment_strategy() -> impl Strategy<Value = (u8, i64)> {
        (0u8..4, -20i64..=20)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// No sequence of strict adjustment sets can drive a pool negative
        #[test]
        fn prop_pools_never_negative(
            batches in prop::collection::vec(
                prop::collection::vec(adjustment_strategy(), 1..5),
                1..20
            )
        ) {
            let mut ledger = InventoryLedger::new();
            let pools = [Pool::Virtual, Pool::Billed, Pool::SoldVirtual, Pool::SoldBilled];

            for batch in batches {
                let adjustments: Vec<Adjustment> = batch
                    .iter()
                    .map(|(pool, delta)| Adjustment {
                        key: key(),
                        pool: pools[*pool as usize],
                        delta: Decimal::from(*delta),
                        mode: AdjustMode::Strict,
                    })
                    .collect();

                let before = ledger.snapshot(&key());
                if ledger.apply(&adjustments).is_err() {
                    prop_assert_eq!(ledger.snapshot(&key()), before);
                }

                for pool in pools {
                    prop_assert!(ledger.quantity(&key(), pool) >= Decimal::ZERO);
                }
            }
        }
    }
}
