//! Common types used across the platform

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inventory pools tracked per warehouse, item and pickup location
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    /// Ordered from a manufacturer but not yet invoiced
    Virtual,
    /// Invoiced and physically disposable
    Billed,
    /// Reserved for a buyer, backed by virtual stock
    SoldVirtual,
    /// Reserved for a buyer, backed by billed stock
    SoldBilled,
}

impl Pool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Virtual => "virtual",
            Pool::Billed => "billed",
            Pool::SoldVirtual => "sold_virtual",
            Pool::SoldBilled => "sold_billed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "virtual" => Some(Pool::Virtual),
            "billed" => Some(Pool::Billed),
            "sold_virtual" => Some(Pool::SoldVirtual),
            "sold_billed" => Some(Pool::SoldBilled),
            _ => None,
        }
    }
}

impl std::fmt::Display for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one row of the inventory ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey {
    pub warehouse_id: Uuid,
    pub item_id: Uuid,
    /// Optional pickup location tag; `None` is its own key
    pub pickup: Option<String>,
}

impl PoolKey {
    pub fn new(warehouse_id: Uuid, item_id: Uuid, pickup: Option<String>) -> Self {
        Self {
            warehouse_id,
            item_id,
            pickup,
        }
    }
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pickup {
            Some(pickup) => write!(f, "{}/{}@{}", self.warehouse_id, self.item_id, pickup),
            None => write!(f, "{}/{}", self.warehouse_id, self.item_id),
        }
    }
}

/// Kinds of parties and documents that appear as movement endpoints in item history
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Manufacturer,
    Warehouse,
    Order,
    Purchase,
    Booking,
    Sale,
    TotalSale,
    Buyer,
    CreditNote,
}

impl EndpointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::Manufacturer => "manufacturer",
            EndpointKind::Warehouse => "warehouse",
            EndpointKind::Order => "order",
            EndpointKind::Purchase => "purchase",
            EndpointKind::Booking => "booking",
            EndpointKind::Sale => "sale",
            EndpointKind::TotalSale => "total_sale",
            EndpointKind::Buyer => "buyer",
            EndpointKind::CreditNote => "credit_note",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manufacturer" => Some(EndpointKind::Manufacturer),
            "warehouse" => Some(EndpointKind::Warehouse),
            "order" => Some(EndpointKind::Order),
            "purchase" => Some(EndpointKind::Purchase),
            "booking" => Some(EndpointKind::Booking),
            "sale" => Some(EndpointKind::Sale),
            "total_sale" => Some(EndpointKind::TotalSale),
            "buyer" => Some(EndpointKind::Buyer),
            "credit_note" => Some(EndpointKind::CreditNote),
            _ => None,
        }
    }
}

/// Tax amounts attached to a priced document line
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaxFields {
    /// Percentage, copied from the item at document time
    pub tax_rate: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
}

impl TaxFields {
    /// Compute tax for `quantity` units at `rate` with a percentage `tax_rate`
    pub fn compute(quantity: Decimal, rate: Decimal, tax_rate: Decimal) -> Self {
        let taxable_amount = quantity * rate;
        let tax_amount = (taxable_amount * tax_rate / Decimal::from(100)).round_dp(2);
        Self {
            tax_rate,
            taxable_amount,
            tax_amount,
        }
    }
}
