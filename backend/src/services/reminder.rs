//! Payment and delivery reminders
//!
//! Read-only: lists documents whose due date has passed without the
//! document reaching its final status. Sending is left to the caller.

use std::sync::Arc;

use chrono::NaiveDate;
use shared::{BookingStatus, OrderStatus, Reminder, ReminderKind};

use crate::store::{Store, StoreState};

#[derive(Clone)]
pub struct ReminderService {
    store: Arc<Store>,
}

impl ReminderService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Everything due on or before `as_of`, earliest first
    pub fn pending_reminders(&self, as_of: NaiveDate) -> Vec<Reminder> {
        let reminders = self.store.read(|state| pending(state, as_of));
        tracing::debug!(%as_of, count = reminders.len(), "Computed pending reminders");
        reminders
    }
}

fn pending(state: &StoreState, as_of: NaiveDate) -> Vec<Reminder> {
    let orders = state.orders.values().filter_map(|order| {
        let due = order.due_date.filter(|d| *d <= as_of)?;
        (order.status != OrderStatus::Billed).then(|| Reminder {
            kind: ReminderKind::OrderDue,
            document_id: order.id,
            organization_id: order.organization_id,
            due_date: due,
            status: order.status.to_string(),
        })
    });

    let bookings = state.bookings.values().filter_map(|booking| {
        let due = booking.payment_due_date.filter(|d| *d <= as_of)?;
        (booking.status != BookingStatus::Completed).then(|| Reminder {
            kind: ReminderKind::BookingPaymentDue,
            document_id: booking.id,
            organization_id: booking.organization_id,
            due_date: due,
            status: booking.status.to_string(),
        })
    });

    let mut reminders: Vec<Reminder> = orders.chain(bookings).collect();
    reminders.sort_by_key(|r| (r.due_date, r.document_id));
    reminders
}
