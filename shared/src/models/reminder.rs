//! Reminder models consumed by the external scheduler

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a reminder is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Order not fully billed by its due date
    OrderDue,
    /// Booking payment not completed by its due date
    BookingPaymentDue,
}

/// A pending reminder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub kind: ReminderKind,
    pub document_id: Uuid,
    pub organization_id: Uuid,
    pub due_date: NaiveDate,
    /// Current document status, for the message body
    pub status: String,
}
