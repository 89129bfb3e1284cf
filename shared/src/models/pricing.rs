//! Item price book models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current rate of an item, optionally specific to a pickup location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemPrice {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Input for setting an item price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetItemPriceInput {
    pub item_id: Uuid,
    pub pickup: Option<String>,
    pub rate: Decimal,
}
