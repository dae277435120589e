//! # Engine Error Types
//!
//! Error taxonomy for orchestrated operations.
//!
//! ## The Three Caller-Visible Sale Outcomes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleError::Rejected                                                   │
//! │  └── "Nothing happened."                                               │
//! │      Validation, unknown product, insufficient or expired stock        │
//! │      detected before any write. No batch touched, no movement written. │
//! │                                                                         │
//! │  SaleError::RolledBack                                                 │
//! │  └── "The sale failed, but stock was restored."                        │
//! │      Commit failed mid-way; every applied deduction was compensated    │
//! │      (quantity added back + reversing movement). Net stock effect is   │
//! │      zero; the ledger keeps the audit trail.                           │
//! │                                                                         │
//! │  SaleError::CompensationFailure                                        │
//! │  └── "The sale failed AND stock state needs review."                   │
//! │      Compensation itself could not restore one or more batches. The    │
//! │      owed list carries (batch id, quantity) for manual reconciliation. │
//! │      Never retried automatically.                                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use apothek_core::{CoreError, ValidationError};
use apothek_db::DbError;

// =============================================================================
// Engine Error
// =============================================================================

/// Error type for non-sale engine operations (receiving, stocktake,
/// alerts, valuation).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule violation. No state was changed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Sale Error
// =============================================================================

/// What knocked a sale over mid-flight, once it was past the point of
/// pure rejection.
#[derive(Debug, Error)]
pub enum SaleAbortCause {
    /// A domain rule failed against fresh state (e.g., an earlier line
    /// item consumed the stock a later one needed).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// A write to the backing store failed.
    #[error(transparent)]
    Persistence(#[from] DbError),
}

/// Quantity still owed to a batch after a failed compensation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRestitution {
    pub batch_id: String,
    pub quantity: i64,
}

/// Structured failure for [`process_sale`](crate::Engine::process_sale).
#[derive(Debug, Error)]
pub enum SaleError {
    /// Rejected before any state change. Nothing happened.
    #[error("sale rejected: {0}")]
    Rejected(#[from] CoreError),

    /// The sale failed after one or more deductions had been applied;
    /// compensation restored every affected batch.
    #[error("sale aborted, stock restored: {cause}")]
    RolledBack { cause: SaleAbortCause },

    /// The sale failed AND compensation could not restore every batch.
    ///
    /// This is the only error class requiring manual intervention: the
    /// ledger's derived state no longer matches batch reality. The owed
    /// list is also logged at `error!` with full detail.
    #[error("sale failed and stock state needs review: {cause}")]
    CompensationFailure {
        cause: SaleAbortCause,
        owed: Vec<BatchRestitution>,
    },
}

impl From<ValidationError> for SaleError {
    fn from(err: ValidationError) -> Self {
        SaleError::Rejected(CoreError::Validation(err))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_names_the_rule() {
        let err = SaleError::Rejected(CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 2,
            requested: 5,
        });
        assert!(err.to_string().contains("Insufficient stock"));
    }

    #[test]
    fn test_validation_maps_to_rejected() {
        let err: SaleError = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into();
        assert!(matches!(err, SaleError::Rejected(_)));
    }
}
