//! Catalog reference data: items, warehouses and trading parties

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A tradable catalog item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub hsn_code: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub packaging: Option<String>,
    /// Tax percentage applied to priced lines
    pub tax_rate: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A warehouse holding inventory pools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Kinds of trading parties
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Manufacturer,
    Buyer,
    Transporter,
}

impl std::fmt::Display for PartyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartyKind::Manufacturer => write!(f, "Manufacturer"),
            PartyKind::Buyer => write!(f, "Buyer"),
            PartyKind::Transporter => write!(f, "Transporter"),
        }
    }
}

/// A manufacturer, buyer or transporter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub kind: PartyKind,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gst_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering an item
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateItemInput {
    pub organization_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub hsn_code: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub packaging: Option<String>,
    #[serde(default)]
    pub tax_rate: Decimal,
}

/// Input for registering a warehouse
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWarehouseInput {
    pub organization_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub address: Option<String>,
}

/// Input for registering a trading party
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePartyInput {
    pub organization_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gst_number: Option<String>,
}
