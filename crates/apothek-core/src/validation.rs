//! # Validation Module
//!
//! Input validation utilities for Apothek POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI layer (excluded from this workspace)                      │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Engine operation (Rust)                                      │
//! │  └── THIS MODULE: Business rule validation, BEFORE any state change    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── CHECK (remaining_quantity >= 0)                                   │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Unit Cost Sanity
//! Receiving is the one place unit-cost validity is enforced. Historically
//! this system's data accumulated batches whose "unit cost" was really the
//! pack cost; correcting that after the fact is guesswork. The fix is an
//! explicit `pack_size` at entry time plus a plausibility bound against
//! the selling price.

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::{MAX_LINE_QUANTITY, MAX_UNIT_COST_MULTIPLIER};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a supplier batch number.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 60 characters
///
/// Batch numbers are supplier labels, not identifiers; the same label may
/// legitimately recur across deliveries, so uniqueness is NOT checked.
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let batch_number = batch_number.trim();

    if batch_number.is_empty() {
        return Err(ValidationError::Required {
            field: "batch_number".to_string(),
        });
    }

    if batch_number.len() > 60 {
        return Err(ValidationError::TooLong {
            field: "batch_number".to_string(),
            max: 60,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale/receiving quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a selling price in cents.
///
/// Zero is allowed: some items (e.g., charity dispensing) retail for free.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a reorder point. Zero disables low-stock alerts.
pub fn validate_reorder_point(reorder_point: i64) -> ValidationResult<()> {
    if reorder_point < 0 {
        return Err(ValidationError::OutOfRange {
            field: "reorder_point".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates an expiry date at receiving time.
///
/// Stock that is already expired on arrival is refused; it would be
/// unsellable and would immediately trip the expired-stock sale guard.
pub fn validate_expiry_date(expiry_date: NaiveDate, today: NaiveDate) -> ValidationResult<()> {
    if expiry_date < today {
        return Err(ValidationError::ExpiredOnArrival { expiry_date });
    }

    Ok(())
}

/// Derives and validates the per-unit cost for a received batch.
///
/// ## Arguments
/// * `cost_cents` - The entered cost. Per-unit when `pack_size` is None,
///   per-pack otherwise.
/// * `pack_size` - Units per pack, when the cost was entered per pack.
/// * `selling_price_cents` - The product's retail price, for the
///   plausibility bound. Zero disables the bound.
///
/// ## Rules
/// - Cost must be positive
/// - Pack size, when given, must be positive; per-unit cost is the pack
///   cost divided by the pack size, rounded to the nearest cent
/// - A per-unit cost above `MAX_UNIT_COST_MULTIPLIER ×` selling price is
///   rejected as a probable pack-cost mis-entry
///
/// ## Returns
/// The validated per-unit cost in cents.
pub fn derive_unit_cost(
    cost_cents: i64,
    pack_size: Option<i64>,
    selling_price_cents: i64,
) -> ValidationResult<i64> {
    if cost_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit_cost".to_string(),
        });
    }

    let unit_cost_cents = match pack_size {
        None => cost_cents,
        Some(size) if size <= 0 => {
            return Err(ValidationError::MustBePositive {
                field: "pack_size".to_string(),
            });
        }
        Some(size) => (cost_cents + size / 2) / size,
    };

    if unit_cost_cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "unit_cost".to_string(),
        });
    }

    if selling_price_cents > 0 && unit_cost_cents > selling_price_cents * MAX_UNIT_COST_MULTIPLIER {
        return Err(ValidationError::SuspectUnitCost {
            unit_cost_cents,
            selling_price_cents,
        });
    }

    Ok(unit_cost_cents)
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
