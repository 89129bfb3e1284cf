//! Buyer booking (reservation) models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A buyer's reservation against one warehouse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub warehouse_id: Uuid,
    pub buyer_id: Uuid,
    pub lines: Vec<BookingLine>,
    pub delivery: DeliveryDetails,
    pub payment_due_date: Option<NaiveDate>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Find the line reserving `item_id` at `pickup`
    pub fn line(&self, item_id: Uuid, pickup: Option<&str>) -> Option<&BookingLine> {
        self.lines
            .iter()
            .find(|l| l.item_id == item_id && l.pickup.as_deref() == pickup)
    }
}

/// Reserved quantity of one item, split by source pool.
///
/// `virtual_quantity + billed_quantity == quantity` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingLine {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
    pub virtual_quantity: Decimal,
    pub billed_quantity: Decimal,
    pub rate: Decimal,
}

/// Delivery and pickup details for a booking
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryDetails {
    pub transporter_id: Option<Uuid>,
    pub delivery_address: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub vehicle_number: Option<String>,
}

/// Booking status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Created,
    PartiallySold,
    FullySold,
    PaymentPending,
    Completed,
}

impl BookingStatus {
    /// Statuses reached only after the booking is fully sold
    pub fn is_post_fulfilment(&self) -> bool {
        matches!(self, BookingStatus::PaymentPending | BookingStatus::Completed)
    }

    /// Whether a manual transition from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::FullySold, BookingStatus::PaymentPending)
                | (BookingStatus::PaymentPending, BookingStatus::Completed)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Created => write!(f, "created"),
            BookingStatus::PartiallySold => write!(f, "partially sold"),
            BookingStatus::FullySold => write!(f, "fully sold"),
            BookingStatus::PaymentPending => write!(f, "payment pending"),
            BookingStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Input for creating a booking
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBookingInput {
    pub organization_id: Uuid,
    pub warehouse_id: Uuid,
    pub buyer_id: Uuid,
    #[validate(length(min = 1, message = "a booking needs at least one line"))]
    pub lines: Vec<BookingLineInput>,
    #[serde(default)]
    pub delivery: DeliveryDetails,
    pub payment_due_date: Option<NaiveDate>,
}

/// Booking line input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingLineInput {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
    pub virtual_quantity: Decimal,
    pub billed_quantity: Decimal,
    pub rate: Option<Decimal>,
}

/// Input for updating a booking
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBookingInput {
    /// Replacement lines; only accepted before any sale
    #[validate(length(min = 1, message = "a booking needs at least one line"))]
    pub lines: Option<Vec<BookingLineInput>>,
    pub delivery: Option<DeliveryDetails>,
    pub payment_due_date: Option<NaiveDate>,
    pub status: Option<BookingStatus>,
}
