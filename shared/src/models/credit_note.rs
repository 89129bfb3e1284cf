//! Credit note models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Correction of over-billed quantity on a total sale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNote {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub total_sale_id: Uuid,
    pub lines: Vec<CreditNoteLine>,
    pub status: CreditNoteStatus,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Credited quantity of one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNoteLine {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub warehouse_id: Uuid,
    /// Sum of every sale under the total sale for this item
    pub total_quantity_sold: Decimal,
    /// Quantity the buyer actually settles
    pub settled_quantity: Decimal,
    /// Over-billed quantity returned to stock
    pub quantity: Decimal,
}

/// Credit note status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Issued,
    Settled,
}

/// Input for issuing a credit note
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCreditNoteInput {
    pub total_sale_id: Uuid,
    pub reason: Option<String>,
    #[validate(length(min = 1, message = "a credit note needs at least one line"))]
    pub lines: Vec<CreditNoteLineInput>,
}

/// Credit note line input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNoteLineInput {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    /// Required only when the item was sold from more than one warehouse
    pub warehouse_id: Option<Uuid>,
    pub settled_quantity: Decimal,
}
