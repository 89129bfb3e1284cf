//! Booking service
//!
//! A booking reserves stock for a buyer by moving each line's split out of
//! the virtual and billed pools into the matching sold pools.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    derive_booking_status, validate_booking_split, validate_unique_lines, Booking, BookingLine,
    BookingLineInput, BookingStatus, CreateBookingInput, EndpointKind, PartyKind, Pool, PoolKey,
    UpdateBookingInput,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::Notification;
use crate::services::item_history::movement;
use crate::services::pricing::resolve_rate;
use crate::store::{Adjustment, LockKey, Store, StoreState, UnitOfWork, Write};

/// Booking lifecycle service
#[derive(Clone)]
pub struct BookingService {
    store: Arc<Store>,
}

impl BookingService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Reserve stock for a buyer
    #[tracing::instrument(skip(self, input), fields(warehouse_id = %input.warehouse_id))]
    pub async fn create_booking(&self, input: CreateBookingInput) -> AppResult<Booking> {
        input.validate()?;
        validate_lines(&input.lines)?;

        let now = Utc::now();
        let booking = self.store.read(|state| -> AppResult<Booking> {
            state.warehouse(input.warehouse_id)?;
            state.party(PartyKind::Buyer, input.buyer_id)?;
            if let Some(transporter_id) = input.delivery.transporter_id {
                state.party(PartyKind::Transporter, transporter_id)?;
            }

            Ok(Booking {
                id: Uuid::new_v4(),
                organization_id: input.organization_id,
                warehouse_id: input.warehouse_id,
                buyer_id: input.buyer_id,
                lines: build_lines(state, &input.lines)?,
                delivery: input.delivery.clone(),
                payment_due_date: input.payment_due_date,
                status: BookingStatus::Created,
                created_at: now,
                updated_at: now,
            })
        })?;

        let locks = self
            .store
            .lock(
                pool_keys(&booking)
                    .into_iter()
                    .map(LockKey::Pool)
                    .chain([LockKey::Booking(booking.id)]),
            )
            .await?;

        let mut uow = UnitOfWork::new();
        reserve(&mut uow, &booking, now);
        uow.write(Write::Booking(booking.clone()))
            .notify(Notification::new(
                EndpointKind::Booking,
                booking.id,
                "Booking created",
                format!(
                    "Booking {} reserves {} line(s) for buyer {}",
                    booking.id,
                    booking.lines.len(),
                    booking.buyer_id
                ),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(
            booking_id = %booking.id,
            buyer_id = %booking.buyer_id,
            lines = booking.lines.len(),
            "Booking created"
        );
        Ok(booking)
    }

    pub fn get_booking(&self, id: Uuid) -> AppResult<Booking> {
        self.store.read(|state| state.booking(id).cloned())
    }

    pub fn list_bookings(&self, buyer_id: Option<Uuid>) -> Vec<Booking> {
        self.store.read(|state| {
            let mut bookings: Vec<Booking> = state
                .bookings
                .values()
                .filter(|b| buyer_id.map_or(true, |id| b.buyer_id == id))
                .cloned()
                .collect();
            bookings.sort_by_key(|b| b.created_at);
            bookings
        })
    }

    /// Change lines, delivery details, payment due date or payment status
    #[tracing::instrument(skip(self, input))]
    pub async fn update_booking(&self, id: Uuid, input: UpdateBookingInput) -> AppResult<Booking> {
        input.validate()?;
        if let Some(lines) = &input.lines {
            validate_lines(lines)?;
        }

        let (current, replacement) = self.store.read(|state| -> AppResult<_> {
            let current = state.booking(id)?.clone();
            if let Some(transporter_id) = input.delivery.as_ref().and_then(|d| d.transporter_id) {
                state.party(PartyKind::Transporter, transporter_id)?;
            }
            let replacement = match &input.lines {
                Some(lines) => Some(build_lines(state, lines)?),
                None => None,
            };
            Ok((current, replacement))
        })?;

        let mut keys: Vec<LockKey> = pool_keys(&current).into_iter().map(LockKey::Pool).collect();
        if let Some(lines) = &replacement {
            keys.extend(
                lines
                    .iter()
                    .map(|l| LockKey::Pool(line_key(current.warehouse_id, l))),
            );
        }
        keys.push(LockKey::Booking(id));
        let locks = self.store.lock(keys).await?;

        let locked_lines = current.lines;
        let (current, sales) = self.store.read(|state| -> AppResult<_> {
            Ok((state.booking(id)?.clone(), state.sales_for_booking(id)))
        })?;
        if current.lines != locked_lines {
            return Err(AppError::Contention(format!(
                "Booking {} changed while acquiring locks",
                id
            )));
        }

        let now = Utc::now();
        let mut uow = UnitOfWork::new();
        let mut updated = current.clone();

        if let Some(lines) = replacement {
            if !sales.is_empty() {
                return Err(AppError::AlreadyFinalized(format!(
                    "Booking {} has sales; its lines cannot change",
                    id
                )));
            }
            release(&mut uow, &current, now);
            updated.lines = lines;
            reserve(&mut uow, &updated, now);
            updated.status = derive_booking_status(&updated, &sales);
        }
        if let Some(delivery) = input.delivery {
            updated.delivery = delivery;
        }
        if let Some(due) = input.payment_due_date {
            updated.payment_due_date = Some(due);
        }
        if let Some(next) = input.status {
            if next != updated.status {
                if !updated.status.can_transition_to(next) {
                    return Err(AppError::validation(
                        "status",
                        format!("Cannot move booking from {} to {}", updated.status, next),
                    ));
                }
                updated.status = next;
            }
        }
        updated.updated_at = now;

        uow.write(Write::Booking(updated.clone()))
            .notify(Notification::new(
                EndpointKind::Booking,
                id,
                "Booking updated",
                format!("Booking {} is {}", id, updated.status),
            ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(booking_id = %id, status = %updated.status, "Booking updated");
        Ok(updated)
    }

    /// Delete a booking without sales and release its reservation
    #[tracing::instrument(skip(self))]
    pub async fn delete_booking(&self, id: Uuid) -> AppResult<()> {
        let (warehouse_id, locked_lines) = self
            .store
            .read(|state| state.booking(id).map(|b| (b.warehouse_id, b.lines.clone())))?;
        let locks = self
            .store
            .lock(
                locked_lines
                    .iter()
                    .map(|line| LockKey::Pool(line_key(warehouse_id, line)))
                    .chain([LockKey::Booking(id)]),
            )
            .await?;

        let booking = self.store.read(|state| -> AppResult<Booking> {
            let booking = state.booking(id)?.clone();
            if booking.lines != locked_lines {
                return Err(AppError::Contention(format!(
                    "Booking {} changed while acquiring locks",
                    id
                )));
            }
            if !state.sales_for_booking(id).is_empty() {
                return Err(AppError::AlreadyFinalized(format!(
                    "Booking {} has sales and cannot be deleted",
                    id
                )));
            }
            Ok(booking)
        })?;

        let mut uow = UnitOfWork::new();
        release(&mut uow, &booking, Utc::now());
        uow.write(Write::RemoveBooking(id)).notify(Notification::new(
            EndpointKind::Booking,
            id,
            "Booking deleted",
            format!("Booking {} was deleted", id),
        ));

        self.store.commit(&locks, uow).await?;

        tracing::info!(booking_id = %id, "Booking deleted");
        Ok(())
    }
}

fn validate_lines(lines: &[BookingLineInput]) -> AppResult<()> {
    for line in lines {
        validate_booking_split(line).map_err(|e| AppError::validation("lines", e))?;
    }
    validate_unique_lines(lines.iter().map(|l| (l.item_id, l.pickup.as_deref())))
        .map_err(|e| AppError::validation("lines", e))
}

fn build_lines(state: &StoreState, lines: &[BookingLineInput]) -> AppResult<Vec<BookingLine>> {
    lines
        .iter()
        .map(|line| -> AppResult<BookingLine> {
            state.item(line.item_id)?;
            let rate = resolve_rate(state, line.rate, line.item_id, line.pickup.as_deref(), None)?;
            Ok(BookingLine {
                item_id: line.item_id,
                pickup: line.pickup.clone(),
                quantity: line.quantity,
                virtual_quantity: line.virtual_quantity,
                billed_quantity: line.billed_quantity,
                rate,
            })
        })
        .collect()
}

fn line_key(warehouse_id: Uuid, line: &BookingLine) -> PoolKey {
    PoolKey::new(warehouse_id, line.item_id, line.pickup.clone())
}

fn pool_keys(booking: &Booking) -> Vec<PoolKey> {
    booking
        .lines
        .iter()
        .map(|line| line_key(booking.warehouse_id, line))
        .collect()
}

/// Move each line's split from the stock pools into the sold pools
fn reserve(uow: &mut UnitOfWork, booking: &Booking, at: chrono::DateTime<Utc>) {
    for line in &booking.lines {
        let key = line_key(booking.warehouse_id, line);
        uow.add_nonzero(&key, Pool::Virtual, -line.virtual_quantity)
            .add_nonzero(&key, Pool::Billed, -line.billed_quantity)
            .adjust(Adjustment::add(key.clone(), Pool::SoldVirtual, line.virtual_quantity))
            .adjust(Adjustment::add(key.clone(), Pool::SoldBilled, line.billed_quantity))
            .record(movement(
                booking.organization_id,
                &key,
                (EndpointKind::Warehouse, booking.warehouse_id),
                (EndpointKind::Booking, booking.id),
                line.quantity,
                at,
            ));
    }
}

/// Return each line's split from the sold pools to the stock pools
fn release(uow: &mut UnitOfWork, booking: &Booking, at: chrono::DateTime<Utc>) {
    for line in &booking.lines {
        let key = line_key(booking.warehouse_id, line);
        uow.add_nonzero(&key, Pool::SoldVirtual, -line.virtual_quantity)
            .add_nonzero(&key, Pool::SoldBilled, -line.billed_quantity)
            .add_nonzero(&key, Pool::Virtual, line.virtual_quantity)
            .add_nonzero(&key, Pool::Billed, line.billed_quantity)
            .record(movement(
                booking.organization_id,
                &key,
                (EndpointKind::Booking, booking.id),
                (EndpointKind::Warehouse, booking.warehouse_id),
                line.quantity,
                at,
            ));
    }
}
