//! Status derivation for orders and bookings
//!
//! Statuses are pure functions of the full child-document history. They are
//! recomputed on every create and delete instead of being incremented, so the
//! result never depends on the order in which purchases or sales arrived.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Order, OrderStatus, Purchase, Sale};

/// How far a set of authorized lines has been consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fulfilment {
    None,
    Partial,
    Full,
}

/// Classify `(authorized, consumed)` pairs, one per line
pub fn fulfilment<I>(lines: I) -> Fulfilment
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let mut any_consumed = false;
    let mut all_full = true;
    let mut empty = true;

    for (authorized, consumed) in lines {
        empty = false;
        if consumed > Decimal::ZERO {
            any_consumed = true;
        }
        if consumed < authorized {
            all_full = false;
        }
    }

    if empty {
        Fulfilment::None
    } else if all_full {
        Fulfilment::Full
    } else if any_consumed {
        Fulfilment::Partial
    } else {
        Fulfilment::None
    }
}

/// Total purchased so far for one order line
pub fn purchased_quantity(
    purchases: &[Purchase],
    order_id: Uuid,
    item_id: Uuid,
    pickup: Option<&str>,
) -> Decimal {
    purchases
        .iter()
        .filter(|p| p.order_id == order_id)
        .flat_map(|p| p.lines.iter())
        .filter(|l| l.item_id == item_id && l.pickup.as_deref() == pickup)
        .map(|l| l.quantity)
        .sum()
}

/// Total sold so far for one booking line
pub fn sold_quantity(
    sales: &[Sale],
    booking_id: Uuid,
    item_id: Uuid,
    pickup: Option<&str>,
) -> Decimal {
    sales
        .iter()
        .flat_map(|s| s.lines.iter())
        .filter(|l| {
            l.booking_id == booking_id && l.item_id == item_id && l.pickup.as_deref() == pickup
        })
        .map(|l| l.quantity)
        .sum()
}

/// Derive an order's status from every purchase recorded against it
pub fn derive_order_status(order: &Order, purchases: &[Purchase]) -> OrderStatus {
    let lines = order.lines.iter().map(|line| {
        (
            line.ordered_quantity,
            purchased_quantity(purchases, order.id, line.item_id, line.pickup.as_deref()),
        )
    });

    match fulfilment(lines) {
        Fulfilment::Full => OrderStatus::Billed,
        Fulfilment::Partial => OrderStatus::PartiallyPaid,
        Fulfilment::None => OrderStatus::Created,
    }
}

/// Derive a booking's status from every sale recorded against it.
///
/// Payment statuses set after fulfilment survive as long as the booking
/// stays fully sold.
pub fn derive_booking_status(booking: &Booking, sales: &[Sale]) -> BookingStatus {
    let lines = booking.lines.iter().map(|line| {
        (
            line.quantity,
            sold_quantity(sales, booking.id, line.item_id, line.pickup.as_deref()),
        )
    });

    match fulfilment(lines) {
        Fulfilment::Full if booking.status.is_post_fulfilment() => booking.status,
        Fulfilment::Full => BookingStatus::FullySold,
        Fulfilment::Partial => BookingStatus::PartiallySold,
        Fulfilment::None => BookingStatus::Created,
    }
}
