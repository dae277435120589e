//! # Error Types
//!
//! Domain-specific error types for apothek-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  apothek-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  apothek-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  apothek-engine errors (separate crate)                                │
//! │  └── SaleError        - Orchestration outcomes incl. compensation      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SaleError → caller                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product id, quantities, dates)
//! 3. Errors are enum variants, never String
//! 4. Refusals carry enough data for the caller to explain them

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. None of them implies
/// any state change: a function returning `CoreError` has mutated nothing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (or is soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Batch cannot be found.
    #[error("Batch not found: {0}")]
    BatchNotFound(String),

    /// The FIFO allocator cannot cover the requested quantity.
    ///
    /// ## When This Occurs
    /// - Requested quantity exceeds the total remaining quantity across
    ///   all of the product's batches at allocation time
    ///
    /// The allocator returns this before touching any state; a sale that
    /// hits it mid-transaction rolls earlier line items back.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// The FIFO order would dispense an expired batch.
    ///
    /// An expired batch at the front of the expiry queue blocks the whole
    /// sale for that product. This is a domain error, not a warning: the
    /// expired stock must be removed via stocktake or adjustment first.
    #[error("Batch {batch_id} of product {product_id} expired on {expiry_date}")]
    ExpiredStock {
        product_id: String,
        batch_id: String,
        expiry_date: NaiveDate,
    },

    /// Stocktake session is not in a state that allows the operation.
    ///
    /// ## When This Occurs
    /// - Counting into an approved or cancelled session
    /// - Approving a session twice
    #[error("Stocktake session {session_id} is {current_status}, cannot perform operation")]
    InvalidSessionStatus {
        session_id: String,
        current_status: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed batch number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Expiry date already in the past at receiving time.
    #[error("expiry date {expiry_date} is in the past")]
    ExpiredOnArrival { expiry_date: NaiveDate },

    /// Unit cost out of all proportion to the selling price.
    ///
    /// ## When This Occurs
    /// - The per-pack cost was entered in the per-unit field
    /// - A decimal point slipped during entry
    ///
    /// Receiving rejects the entry; the caller should re-enter the cost or
    /// supply the pack size so the per-unit cost can be derived.
    #[error("unit cost {unit_cost_cents}c is implausible against selling price {selling_price_cents}c; check for pack cost entered as unit cost")]
    SuspectUnitCost {
        unit_cost_cents: i64,
        selling_price_cents: i64,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product p-1: available 3, requested 5"
        );
    }

    #[test]
    fn test_expired_stock_message() {
        let err = CoreError::ExpiredStock {
            product_id: "p-1".to_string(),
            batch_id: "b-9".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Batch b-9 of product p-1 expired on 2026-01-31"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "batch_number".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
