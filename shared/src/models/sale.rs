//! Sale and invoicing batch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::types::TaxFields;

/// Fulfilment of one or more bookings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub buyer_id: Uuid,
    pub booking_ids: Vec<Uuid>,
    pub lines: Vec<SaleLine>,
    pub total_sale_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Sold quantity of one booking line, with the pool movements it caused
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub booking_id: Uuid,
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
    pub rate: Decimal,
    pub tax: TaxFields,
    pub drain: SaleDrain,
}

/// Ledger adjustments applied when a sale line was consumed.
///
/// Deleting the sale reverses exactly these amounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SaleDrain {
    /// Taken from `soldInventory.billedQuantity`
    pub from_sold_billed: Decimal,
    /// Shortfall taken from `soldInventory.virtualQuantity` and the billed pool
    pub shortfall: Decimal,
    /// Portion of the shortfall returned to the virtual pool
    pub restored_virtual: Decimal,
}

/// Input for creating a sale
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSaleInput {
    pub organization_id: Uuid,
    #[validate(length(min = 1, message = "a sale targets at least one booking"))]
    pub booking_ids: Vec<Uuid>,
    #[validate(length(min = 1, message = "a sale needs at least one line"))]
    pub lines: Vec<CreateSaleLineInput>,
}

/// Sale line input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleLineInput {
    pub booking_id: Uuid,
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub quantity: Decimal,
    pub rate: Option<Decimal>,
}

/// A batch of sales invoiced together to one buyer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalSale {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub buyer_id: Uuid,
    pub sale_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for grouping sales into an invoicing batch
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTotalSaleInput {
    pub organization_id: Uuid,
    pub buyer_id: Uuid,
    #[validate(length(min = 1, message = "a total sale groups at least one sale"))]
    pub sale_ids: Vec<Uuid>,
}
