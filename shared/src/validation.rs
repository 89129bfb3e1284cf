//! Validation utilities for Trade Ledger documents
//!
//! Structural checks (non-empty line lists, name lengths) live on the input
//! types as `validator` derives. The helpers here cover the quantity rules
//! that need arithmetic.

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{BookingLineInput, CreateSaleInput};

// ============================================================================
// Quantity Validations
// ============================================================================

/// Validate that a line quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    Ok(())
}

/// Validate that a rate is not negative
pub fn validate_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO {
        return Err("Rate cannot be negative");
    }
    Ok(())
}

/// Validate a tax percentage (0-100)
pub fn validate_tax_rate(tax_rate: Decimal) -> Result<(), &'static str> {
    if tax_rate < Decimal::ZERO || tax_rate > Decimal::from(100) {
        return Err("Tax rate must be between 0 and 100");
    }
    Ok(())
}

/// Validate that a booking line's split covers its quantity exactly
pub fn validate_booking_split(line: &BookingLineInput) -> Result<(), &'static str> {
    validate_positive_quantity(line.quantity)?;
    if line.virtual_quantity < Decimal::ZERO || line.billed_quantity < Decimal::ZERO {
        return Err("Split quantities cannot be negative");
    }
    if line.virtual_quantity + line.billed_quantity != line.quantity {
        return Err("Virtual and billed quantities must sum to the booked quantity");
    }
    Ok(())
}

/// Validate a settled quantity on a credit note line
pub fn validate_settled_quantity(settled: Decimal) -> Result<(), &'static str> {
    if settled < Decimal::ZERO {
        return Err("Settled quantity cannot be negative");
    }
    Ok(())
}

// ============================================================================
// Line Structure Validations
// ============================================================================

/// Validate that no two lines address the same `(item, pickup)` pair
pub fn validate_unique_lines<'a, I>(lines: I) -> Result<(), &'static str>
where
    I: IntoIterator<Item = (Uuid, Option<&'a str>)>,
{
    let mut seen = HashSet::new();
    for key in lines {
        if !seen.insert(key) {
            return Err("Duplicate line for the same item and pickup location");
        }
    }
    Ok(())
}

/// Validate that every sale line targets one of the sale's bookings
pub fn validate_sale_targets(input: &CreateSaleInput) -> Result<(), &'static str> {
    let targets: HashSet<Uuid> = input.booking_ids.iter().copied().collect();
    if targets.len() != input.booking_ids.len() {
        return Err("Booking ids must be unique");
    }
    if input.lines.iter().any(|l| !targets.contains(&l.booking_id)) {
        return Err("Every sale line must reference one of the targeted bookings");
    }
    let mut seen = HashSet::new();
    for line in &input.lines {
        if !seen.insert((line.booking_id, line.item_id, line.pickup.as_deref())) {
            return Err("Duplicate sale line for the same booking, item and pickup location");
        }
    }
    Ok(())
}
