//! Purchase (invoicing event) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::TaxFields;

/// One invoicing event against an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub order_id: Uuid,
    /// Warehouse receiving the billed stock; may differ from the order's warehouse
    pub warehouse_id: Uuid,
    pub invoice_number: Option<String>,
    pub lines: Vec<PurchaseLine>,
    pub created_at: DateTime<Utc>,
}

/// Purchased quantity of one order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub tax: TaxFields,
}

/// Input for creating a purchase
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseInput {
    pub order_id: Uuid,
    pub warehouse_id: Uuid,
    pub invoice_number: Option<String>,
    #[validate(length(min = 1, message = "a purchase needs at least one line"))]
    pub lines: Vec<CreatePurchaseLineInput>,
}

/// Purchase line input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseLineInput {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
}
