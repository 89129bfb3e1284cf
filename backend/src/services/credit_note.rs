//! Credit note service
//!
//! A credit note returns over-billed quantity of a total sale to stock. On
//! issue the quantity lands in the billed pool as returned stock awaiting
//! credit; settlement moves it on to the virtual pool.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    validate_settled_quantity, CreateCreditNoteInput, CreditNote, CreditNoteLine,
    CreditNoteLineInput, CreditNoteStatus, EndpointKind, Pool, PoolKey, Sale, TotalSale,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::Notification;
use crate::services::item_history::movement;
use crate::store::{Adjustment, LockKey, Store, UnitOfWork, Write};

/// Credit note lifecycle service
#[derive(Clone)]
pub struct CreditNoteService {
    store: Arc<Store>,
}

impl CreditNoteService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Issue a credit note for every over-billed line of a total sale
    #[tracing::instrument(skip(self, input), fields(total_sale_id = %input.total_sale_id))]
    pub async fn create_credit_note(&self, input: CreateCreditNoteInput) -> AppResult<CreditNote> {
        input.validate()?;
        for line in &input.lines {
            validate_settled_quantity(line.settled_quantity)
                .map_err(|e| AppError::validation("settled_quantity", e))?;
        }

        let note_id = Uuid::new_v4();

        // Sales of a total sale cannot be deleted, so the warehouses are stable
        let keys = self.store.read(|state| -> AppResult<Vec<LockKey>> {
            let total_sale = state.total_sale(input.total_sale_id)?;
            let sales = sales_of(state, total_sale);
            Ok(sales
                .iter()
                .flat_map(|s| s.lines.iter())
                .map(|l| LockKey::Pool(PoolKey::new(l.warehouse_id, l.item_id, l.pickup.clone())))
                .chain([
                    LockKey::TotalSale(input.total_sale_id),
                    LockKey::CreditNote(note_id),
                ])
                .collect())
        })?;
        let locks = self.store.lock(keys).await?;

        let now = Utc::now();
        let (total_sale, lines) = self.store.read(|state| -> AppResult<_> {
            let total_sale = state.total_sale(input.total_sale_id)?.clone();
            let sales = sales_of(state, &total_sale);
            let earlier = state.credit_notes_for_total_sale(total_sale.id);

            let mut lines = Vec::new();
            let mut seen = BTreeSet::new();
            for line in &input.lines {
                let computed = credit_line(&sales, &earlier, line)?;
                // Lines are unique by the warehouse they resolve to, not as written
                let slot = (computed.item_id, computed.pickup.clone(), computed.warehouse_id);
                if !seen.insert(slot) {
                    return Err(AppError::validation(
                        "lines",
                        format!(
                            "Duplicate credit note line for item {} at warehouse {}",
                            computed.item_id, computed.warehouse_id
                        ),
                    ));
                }
                if computed.quantity > Decimal::ZERO {
                    lines.push(computed);
                } else {
                    tracing::debug!(item_id = %line.item_id, "Credit note line is not over-billed");
                }
            }
            Ok((total_sale, lines))
        })?;

        if lines.is_empty() {
            return Err(AppError::validation(
                "lines",
                "No line of the credit note is over-billed",
            ));
        }

        let note = CreditNote {
            id: note_id,
            organization_id: total_sale.organization_id,
            total_sale_id: total_sale.id,
            lines,
            status: CreditNoteStatus::Issued,
            reason: input.reason.clone(),
            created_at: now,
            settled_at: None,
        };

        let mut uow = UnitOfWork::new();
        for line in &note.lines {
            let key = PoolKey::new(line.warehouse_id, line.item_id, line.pickup.clone());
            uow.adjust(Adjustment::add(key.clone(), Pool::Billed, line.quantity))
                .record(movement(
                    note.organization_id,
                    &key,
                    (EndpointKind::Buyer, total_sale.buyer_id),
                    (EndpointKind::CreditNote, note.id),
                    line.quantity,
                    now,
                ));
        }
        uow.write(Write::CreditNote(note.clone()))
            .notify(Notification::new(
                EndpointKind::CreditNote,
                note.id,
                "Credit note issued",
                format!(
                    "Credit note {} returns {} line(s) of total sale {}",
                    note.id,
                    note.lines.len(),
                    total_sale.id
                ),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(
            credit_note_id = %note.id,
            total_sale_id = %total_sale.id,
            lines = note.lines.len(),
            "Credit note issued"
        );
        Ok(note)
    }

    pub fn get_credit_note(&self, id: Uuid) -> AppResult<CreditNote> {
        self.store.read(|state| state.credit_note(id).cloned())
    }

    pub fn list_credit_notes(&self, total_sale_id: Option<Uuid>) -> Vec<CreditNote> {
        self.store.read(|state| {
            let mut notes: Vec<CreditNote> = match total_sale_id {
                Some(id) => state.credit_notes_for_total_sale(id),
                None => state.credit_notes.values().cloned().collect(),
            };
            notes.sort_by_key(|n| n.created_at);
            notes
        })
    }

    /// Move credited quantity from billed to virtual and close the note
    #[tracing::instrument(skip(self))]
    pub async fn settle_credit_note(&self, id: Uuid) -> AppResult<CreditNote> {
        let keys = self.store.read(|state| -> AppResult<Vec<LockKey>> {
            let note = state.credit_note(id)?;
            Ok(note
                .lines
                .iter()
                .map(|l| LockKey::Pool(PoolKey::new(l.warehouse_id, l.item_id, l.pickup.clone())))
                .chain([LockKey::CreditNote(id)])
                .collect())
        })?;
        let locks = self.store.lock(keys).await?;

        let note = self.store.read(|state| state.credit_note(id).cloned())?;
        if note.status == CreditNoteStatus::Settled {
            return Err(AppError::AlreadySettled(id));
        }

        let now = Utc::now();
        let mut uow = UnitOfWork::new();
        for line in &note.lines {
            let key = PoolKey::new(line.warehouse_id, line.item_id, line.pickup.clone());
            uow.adjust(Adjustment::sub(key.clone(), Pool::Billed, line.quantity))
                .adjust(Adjustment::add(key.clone(), Pool::Virtual, line.quantity))
                .record(movement(
                    note.organization_id,
                    &key,
                    (EndpointKind::CreditNote, note.id),
                    (EndpointKind::Warehouse, line.warehouse_id),
                    line.quantity,
                    now,
                ));
        }

        let settled = CreditNote {
            status: CreditNoteStatus::Settled,
            settled_at: Some(now),
            ..note
        };
        uow.write(Write::CreditNote(settled.clone()))
            .notify(Notification::new(
                EndpointKind::CreditNote,
                id,
                "Credit note settled",
                format!("Credit note {} was settled", id),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(credit_note_id = %id, "Credit note settled");
        Ok(settled)
    }
}

fn sales_of(state: &crate::store::StoreState, total_sale: &TotalSale) -> Vec<Sale> {
    total_sale
        .sale_ids
        .iter()
        .filter_map(|id| state.sales.get(id))
        .cloned()
        .collect()
}

/// Compute the over-billed quantity of one requested line
fn credit_line(
    sales: &[Sale],
    earlier: &[CreditNote],
    input: &CreditNoteLineInput,
) -> AppResult<CreditNoteLine> {
    let matching: Vec<_> = sales
        .iter()
        .flat_map(|s| s.lines.iter())
        .filter(|l| l.item_id == input.item_id && l.pickup == input.pickup)
        .collect();

    let warehouses: BTreeSet<Uuid> = matching.iter().map(|l| l.warehouse_id).collect();
    let warehouse_id = match input.warehouse_id {
        Some(id) if warehouses.contains(&id) => id,
        Some(id) => {
            return Err(AppError::validation(
                "warehouse_id",
                format!("Item {} was not sold from warehouse {}", input.item_id, id),
            ))
        }
        None => match (warehouses.first(), warehouses.len()) {
            (Some(id), 1) => *id,
            (None, _) => {
                return Err(AppError::validation(
                    "lines",
                    format!("Item {} was not sold under this total sale", input.item_id),
                ))
            }
            _ => {
                return Err(AppError::validation(
                    "warehouse_id",
                    format!(
                        "Item {} was sold from several warehouses; specify warehouse_id",
                        input.item_id
                    ),
                ))
            }
        },
    };

    let total_quantity_sold: Decimal = matching
        .iter()
        .filter(|l| l.warehouse_id == warehouse_id)
        .map(|l| l.quantity)
        .sum();
    let previously_credited: Decimal = earlier
        .iter()
        .flat_map(|n| n.lines.iter())
        .filter(|l| {
            l.item_id == input.item_id && l.pickup == input.pickup && l.warehouse_id == warehouse_id
        })
        .map(|l| l.quantity)
        .sum();

    Ok(CreditNoteLine {
        item_id: input.item_id,
        pickup: input.pickup.clone(),
        warehouse_id,
        total_quantity_sold,
        settled_quantity: input.settled_quantity,
        quantity: total_quantity_sold - input.settled_quantity - previously_credited,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{SaleDrain, SaleLine, TaxFields};

    fn sale(warehouse_id: Uuid, item_id: Uuid, quantity: i64) -> Sale {
        Sale {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            buyer_id: Uuid::nil(),
            booking_ids: vec![],
            lines: vec![SaleLine {
                booking_id: Uuid::nil(),
                warehouse_id,
                item_id,
                pickup: None,
                quantity: Decimal::from(quantity),
                rate: Decimal::ONE,
                tax: TaxFields::default(),
                drain: SaleDrain::default(),
            }],
            total_sale_id: None,
            created_at: Utc::now(),
        }
    }

    fn request(item_id: Uuid, settled: i64, warehouse_id: Option<Uuid>) -> CreditNoteLineInput {
        CreditNoteLineInput {
            item_id,
            pickup: None,
            warehouse_id,
            settled_quantity: Decimal::from(settled),
        }
    }

    #[test]
    fn test_overbilled_subtracts_earlier_credits() {
        let warehouse = Uuid::new_v4();
        let item = Uuid::new_v4();
        let sales = vec![sale(warehouse, item, 6), sale(warehouse, item, 4)];

        let first = credit_line(&sales, &[], &request(item, 7, None)).unwrap();
        assert_eq!(first.total_quantity_sold, Decimal::from(10));
        assert_eq!(first.quantity, Decimal::from(3));

        let earlier = CreditNote {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            total_sale_id: Uuid::nil(),
            lines: vec![first],
            status: CreditNoteStatus::Issued,
            reason: None,
            created_at: Utc::now(),
            settled_at: None,
        };
        let second = credit_line(&sales, &[earlier], &request(item, 7, None)).unwrap();
        assert_eq!(second.quantity, Decimal::ZERO);
    }

    #[test]
    fn test_multiple_warehouses_need_explicit_choice() {
        let item = Uuid::new_v4();
        let (w1, w2) = (Uuid::new_v4(), Uuid::new_v4());
        let sales = vec![sale(w1, item, 5), sale(w2, item, 5)];

        assert!(credit_line(&sales, &[], &request(item, 1, None)).is_err());
        let line = credit_line(&sales, &[], &request(item, 1, Some(w2))).unwrap();
        assert_eq!(line.warehouse_id, w2);
        assert_eq!(line.quantity, Decimal::from(4));
    }

    #[test]
    fn test_unsold_item_rejected() {
        let sales = vec![sale(Uuid::new_v4(), Uuid::new_v4(), 5)];
        assert!(credit_line(&sales, &[], &request(Uuid::new_v4(), 0, None)).is_err());
    }
}
