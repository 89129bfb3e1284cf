//! Sale and total sale service
//!
//! A sale consumes booking reservations. Each line drains the sold-billed
//! pool first; any shortfall is taken from sold-virtual and the main billed
//! pool, and under the default policy returned to the virtual pool. The
//! amounts applied are stored on the line so deletion reverses them exactly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    derive_booking_status, sold_quantity, validate_positive_quantity, validate_sale_targets,
    Booking, BookingStatus, CreateSaleInput, CreateTotalSaleInput, EndpointKind, PartyKind, Pool,
    PoolKey, Sale, SaleDrain, SaleLine, TaxFields, TotalSale,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::Notification;
use crate::services::item_history::movement;
use crate::services::pricing::resolve_rate;
use crate::store::{LockKey, ShortfallPolicy, Store, StoreState, UnitOfWork, Write};

/// Split a sale quantity into its pool drains
pub fn plan_drain(quantity: Decimal, sold_billed: Decimal, policy: ShortfallPolicy) -> SaleDrain {
    let from_sold_billed = quantity.min(sold_billed.max(Decimal::ZERO));
    let shortfall = quantity - from_sold_billed;
    let restored_virtual = match policy {
        ShortfallPolicy::RestoreVirtual => shortfall,
        ShortfallPolicy::DrainOnly => Decimal::ZERO,
    };
    SaleDrain {
        from_sold_billed,
        shortfall,
        restored_virtual,
    }
}

/// Stage the pool adjustments for one consumed sale line
fn consume(uow: &mut UnitOfWork, key: &PoolKey, drain: &SaleDrain) {
    uow.add_nonzero(key, Pool::SoldBilled, -drain.from_sold_billed)
        .add_nonzero(key, Pool::SoldVirtual, -drain.shortfall)
        .add_nonzero(key, Pool::Billed, -drain.shortfall)
        .add_nonzero(key, Pool::Virtual, drain.restored_virtual);
}

/// Stage the exact inverse of [`consume`]
fn restore(uow: &mut UnitOfWork, key: &PoolKey, drain: &SaleDrain) {
    uow.add_nonzero(key, Pool::SoldBilled, drain.from_sold_billed)
        .add_nonzero(key, Pool::SoldVirtual, drain.shortfall)
        .add_nonzero(key, Pool::Billed, drain.shortfall)
        .add_nonzero(key, Pool::Virtual, -drain.restored_virtual);
}

fn sale_line_key(line: &SaleLine) -> PoolKey {
    PoolKey::new(line.warehouse_id, line.item_id, line.pickup.clone())
}

fn is_fully_sold(status: BookingStatus) -> bool {
    status == BookingStatus::FullySold || status.is_post_fulfilment()
}

/// Sale lifecycle service
#[derive(Clone)]
pub struct SaleService {
    store: Arc<Store>,
}

impl SaleService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Consume booking reservations
    #[tracing::instrument(skip(self, input), fields(bookings = input.booking_ids.len()))]
    pub async fn create_sale(&self, input: CreateSaleInput) -> AppResult<Sale> {
        input.validate()?;
        validate_sale_targets(&input).map_err(|e| AppError::validation("lines", e))?;
        for line in &input.lines {
            validate_positive_quantity(line.quantity)
                .map_err(|e| AppError::validation("quantity", e))?;
        }

        let warehouses = self.store.read(|state| -> AppResult<HashMap<Uuid, Uuid>> {
            let mut buyer = None;
            let mut warehouses = HashMap::new();
            for id in &input.booking_ids {
                let booking = state.booking(*id)?;
                if buyer.map_or(false, |b| b != booking.buyer_id) {
                    return Err(AppError::validation(
                        "booking_ids",
                        "All bookings of a sale must belong to one buyer",
                    ));
                }
                buyer = Some(booking.buyer_id);
                warehouses.insert(booking.id, booking.warehouse_id);
            }
            Ok(warehouses)
        })?;

        let sale_id = Uuid::new_v4();
        let mut keys: Vec<LockKey> = input
            .booking_ids
            .iter()
            .map(|id| LockKey::Booking(*id))
            .collect();
        keys.push(LockKey::Sale(sale_id));
        for line in &input.lines {
            if let Some(warehouse_id) = warehouses.get(&line.booking_id) {
                keys.push(LockKey::Pool(PoolKey::new(
                    *warehouse_id,
                    line.item_id,
                    line.pickup.clone(),
                )));
            }
        }
        let locks = self.store.lock(keys).await?;

        let policy = self.store.shortfall_policy();
        let now = Utc::now();
        let (sale, bookings) = self
            .store
            .read(|state| build_sale(state, &input, sale_id, policy, now))?;

        let mut uow = UnitOfWork::new();
        for line in &sale.lines {
            let key = sale_line_key(line);
            consume(&mut uow, &key, &line.drain);
            uow.record(movement(
                sale.organization_id,
                &key,
                (EndpointKind::Booking, line.booking_id),
                (EndpointKind::Buyer, sale.buyer_id),
                line.quantity,
                now,
            ));
        }
        for booking in &bookings {
            uow.write(Write::Booking(booking.clone()));
        }
        uow.write(Write::Sale(sale.clone())).notify(Notification::new(
            EndpointKind::Sale,
            sale.id,
            "Sale recorded",
            format!(
                "Sale {} covers {} line(s) across {} booking(s)",
                sale.id,
                sale.lines.len(),
                sale.booking_ids.len()
            ),
        ));

        self.store.commit(&locks, uow).await?;

        let shortfall: Decimal = sale.lines.iter().map(|l| l.drain.shortfall).sum();
        tracing::info!(
            sale_id = %sale.id,
            buyer_id = %sale.buyer_id,
            lines = sale.lines.len(),
            shortfall = %shortfall,
            "Sale created"
        );
        Ok(sale)
    }

    pub fn get_sale(&self, id: Uuid) -> AppResult<Sale> {
        self.store.read(|state| state.sale(id).cloned())
    }

    pub fn list_sales(&self, booking_id: Option<Uuid>) -> Vec<Sale> {
        self.store.read(|state| {
            let mut sales: Vec<Sale> = match booking_id {
                Some(id) => state.sales_for_booking(id),
                None => state.sales.values().cloned().collect(),
            };
            sales.sort_by_key(|s| s.created_at);
            sales
        })
    }

    /// Delete a sale, reversing the drains it recorded
    #[tracing::instrument(skip(self))]
    pub async fn delete_sale(&self, id: Uuid) -> AppResult<()> {
        let keys = self.store.read(|state| -> AppResult<Vec<LockKey>> {
            let sale = state.sale(id)?;
            Ok(sale
                .booking_ids
                .iter()
                .map(|b| LockKey::Booking(*b))
                .chain(sale.lines.iter().map(|l| LockKey::Pool(sale_line_key(l))))
                .chain([LockKey::Sale(id)])
                .collect())
        })?;
        let locks = self.store.lock(keys).await?;

        let (sale, bookings) = self.store.read(|state| -> AppResult<(Sale, Vec<Booking>)> {
            let sale = state.sale(id)?.clone();
            if let Some(total_sale_id) = sale.total_sale_id {
                return Err(AppError::AlreadyFinalized(format!(
                    "Sale {} is invoiced in total sale {}",
                    id, total_sale_id
                )));
            }

            let remaining: Vec<Sale> = state
                .sales
                .values()
                .filter(|s| s.id != id)
                .cloned()
                .collect();
            let bookings = sale
                .booking_ids
                .iter()
                .filter_map(|b| state.bookings.get(b))
                .map(|booking| Booking {
                    status: derive_booking_status(booking, &remaining),
                    updated_at: Utc::now(),
                    ..booking.clone()
                })
                .collect();
            Ok((sale, bookings))
        })?;

        let now = Utc::now();
        let mut uow = UnitOfWork::new();
        for line in &sale.lines {
            let key = sale_line_key(line);
            restore(&mut uow, &key, &line.drain);
            uow.record(movement(
                sale.organization_id,
                &key,
                (EndpointKind::Buyer, sale.buyer_id),
                (EndpointKind::Booking, line.booking_id),
                line.quantity,
                now,
            ));
        }
        for booking in &bookings {
            uow.write(Write::Booking(booking.clone()));
        }
        uow.write(Write::RemoveSale(id)).notify(Notification::new(
            EndpointKind::Sale,
            id,
            "Sale deleted",
            format!("Sale {} was deleted", id),
        ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(sale_id = %id, "Sale deleted");
        Ok(())
    }

    // ========================================================================
    // Total sales
    // ========================================================================

    /// Group sales of one buyer into an invoicing batch
    #[tracing::instrument(skip(self, input), fields(buyer_id = %input.buyer_id))]
    pub async fn create_total_sale(&self, input: CreateTotalSaleInput) -> AppResult<TotalSale> {
        input.validate()?;

        let total_sale_id = Uuid::new_v4();
        let locks = self
            .store
            .lock(
                input
                    .sale_ids
                    .iter()
                    .map(|id| LockKey::Sale(*id))
                    .chain([LockKey::TotalSale(total_sale_id)]),
            )
            .await?;

        let now = Utc::now();
        let sales = self.store.read(|state| -> AppResult<Vec<Sale>> {
            state.party(PartyKind::Buyer, input.buyer_id)?;
            let mut sales = Vec::with_capacity(input.sale_ids.len());
            for id in &input.sale_ids {
                let sale = state.sale(*id)?;
                if sale.buyer_id != input.buyer_id {
                    return Err(AppError::validation(
                        "sale_ids",
                        format!("Sale {} belongs to another buyer", id),
                    ));
                }
                if let Some(existing) = sale.total_sale_id {
                    return Err(AppError::AlreadyFinalized(format!(
                        "Sale {} is already in total sale {}",
                        id, existing
                    )));
                }
                if sales.iter().any(|s: &Sale| s.id == *id) {
                    return Err(AppError::validation("sale_ids", "Sale ids must be unique"));
                }
                sales.push(sale.clone());
            }
            Ok(sales)
        })?;

        let total_sale = TotalSale {
            id: total_sale_id,
            organization_id: input.organization_id,
            buyer_id: input.buyer_id,
            sale_ids: input.sale_ids.clone(),
            created_at: now,
        };

        let mut uow = UnitOfWork::new();
        for sale in sales {
            uow.write(Write::Sale(Sale {
                total_sale_id: Some(total_sale_id),
                ..sale
            }));
        }
        uow.write(Write::TotalSale(total_sale.clone()))
            .notify(Notification::new(
                EndpointKind::TotalSale,
                total_sale.id,
                "Total sale created",
                format!(
                    "Total sale {} groups {} sale(s)",
                    total_sale.id,
                    total_sale.sale_ids.len()
                ),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(
            total_sale_id = %total_sale.id,
            sales = total_sale.sale_ids.len(),
            "Total sale created"
        );
        Ok(total_sale)
    }

    pub fn get_total_sale(&self, id: Uuid) -> AppResult<TotalSale> {
        self.store.read(|state| state.total_sale(id).cloned())
    }

    pub fn list_total_sales(&self, buyer_id: Option<Uuid>) -> Vec<TotalSale> {
        self.store.read(|state| {
            let mut totals: Vec<TotalSale> = state
                .total_sales
                .values()
                .filter(|t| buyer_id.map_or(true, |id| t.buyer_id == id))
                .cloned()
                .collect();
            totals.sort_by_key(|t| t.created_at);
            totals
        })
    }
}

/// Validate a sale under its locks and compute its lines and booking updates
fn build_sale(
    state: &StoreState,
    input: &CreateSaleInput,
    sale_id: Uuid,
    policy: ShortfallPolicy,
    now: DateTime<Utc>,
) -> AppResult<(Sale, Vec<Booking>)> {
    let mut bookings: Vec<Booking> = Vec::with_capacity(input.booking_ids.len());
    let mut history: Vec<Sale> = state.sales.values().cloned().collect();

    for id in &input.booking_ids {
        let booking = state.booking(*id)?;
        let status = derive_booking_status(booking, &history);
        if is_fully_sold(status) {
            return Err(AppError::AlreadyFinalized(format!(
                "Booking {} is already fully sold",
                id
            )));
        }
        bookings.push(booking.clone());
    }

    let buyer_id = bookings
        .first()
        .map(|b| b.buyer_id)
        .ok_or_else(|| AppError::validation("booking_ids", "A sale targets at least one booking"))?;
    if bookings.iter().any(|b| b.buyer_id != buyer_id) {
        return Err(AppError::validation(
            "booking_ids",
            "All bookings of a sale must belong to one buyer",
        ));
    }

    // Sold-billed drawn by earlier lines of this sale
    let mut drawn: BTreeMap<PoolKey, Decimal> = BTreeMap::new();
    let mut lines = Vec::with_capacity(input.lines.len());

    for line in &input.lines {
        let booking = bookings
            .iter()
            .find(|b| b.id == line.booking_id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {}", line.booking_id)))?;
        let booking_line = booking
            .line(line.item_id, line.pickup.as_deref())
            .ok_or_else(|| {
                AppError::validation(
                    "lines",
                    format!("Item {} is not on booking {}", line.item_id, booking.id),
                )
            })?;

        let previously_sold = sold_quantity(
            &history,
            booking.id,
            line.item_id,
            line.pickup.as_deref(),
        );
        if previously_sold + line.quantity > booking_line.quantity {
            return Err(AppError::OverSale {
                booking_id: booking.id,
                item_id: line.item_id,
                pickup: line.pickup.clone(),
                booked: booking_line.quantity,
                previously_sold,
                requested: line.quantity,
            });
        }

        let key = PoolKey::new(booking.warehouse_id, line.item_id, line.pickup.clone());
        let already_drawn = drawn.get(&key).copied().unwrap_or(Decimal::ZERO);
        let available = state.ledger.quantity(&key, Pool::SoldBilled) - already_drawn;
        let drain = plan_drain(line.quantity, available, policy);
        *drawn.entry(key).or_insert(Decimal::ZERO) += drain.from_sold_billed;

        let item = state.item(line.item_id)?;
        let rate = resolve_rate(
            state,
            line.rate,
            line.item_id,
            line.pickup.as_deref(),
            Some(booking_line.rate),
        )?;

        lines.push(SaleLine {
            booking_id: booking.id,
            warehouse_id: booking.warehouse_id,
            item_id: line.item_id,
            pickup: line.pickup.clone(),
            quantity: line.quantity,
            rate,
            tax: TaxFields::compute(line.quantity, rate, item.tax_rate),
            drain,
        });
    }

    let sale = Sale {
        id: sale_id,
        organization_id: input.organization_id,
        buyer_id,
        booking_ids: input.booking_ids.clone(),
        lines,
        total_sale_id: None,
        created_at: now,
    };

    history.push(sale.clone());
    for booking in &mut bookings {
        booking.status = derive_booking_status(booking, &history);
        booking.updated_at = now;
    }

    Ok((sale, bookings))
}
