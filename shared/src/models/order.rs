//! Manufacturer order models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::TaxFields;

/// A manufacturer-to-warehouse procurement commitment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub manufacturer_id: Uuid,
    pub warehouse_id: Uuid,
    pub transporter_id: Option<Uuid>,
    pub lines: Vec<OrderLine>,
    /// Derived from the order's purchases, never incremented in place
    pub status: OrderStatus,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Find the line ordering `item_id` at `pickup`
    pub fn line(&self, item_id: Uuid, pickup: Option<&str>) -> Option<&OrderLine> {
        self.lines
            .iter()
            .find(|l| l.item_id == item_id && l.pickup.as_deref() == pickup)
    }
}

/// One ordered item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub ordered_quantity: Decimal,
    pub rate: Decimal,
    pub tax: TaxFields,
}

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    PartiallyPaid,
    Billed,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "created"),
            OrderStatus::PartiallyPaid => write!(f, "partially paid"),
            OrderStatus::Billed => write!(f, "billed"),
        }
    }
}

/// Input for creating an order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub organization_id: Uuid,
    pub manufacturer_id: Uuid,
    pub warehouse_id: Uuid,
    pub transporter_id: Option<Uuid>,
    #[validate(length(min = 1, message = "an order needs at least one line"))]
    pub lines: Vec<CreateOrderLineInput>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Order line input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderLineInput {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub ordered_quantity: Decimal,
    /// Falls back to the price book when absent
    pub rate: Option<Decimal>,
}
