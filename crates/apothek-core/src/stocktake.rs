//! # Stocktake Rules
//!
//! Variance arithmetic for physical count reconciliation.
//!
//! The variance of an item is always derived here from the counted and
//! system quantities; callers never supply it directly. Approval logic
//! (emitting the corrective movements) lives in apothek-engine.

use crate::error::ValidationError;
use crate::types::StocktakeItem;
use crate::validation::ValidationResult;

/// Variance of a count: `counted - system`.
///
/// Positive variance means the shelf holds more than the ledger says and
/// the corrective movement adds stock; negative variance removes it.
#[inline]
pub const fn variance(counted_quantity: i64, system_quantity: i64) -> i64 {
    counted_quantity - system_quantity
}

/// Validates a physical count. Counts are absolute shelf quantities and
/// can be zero, but never negative.
pub fn validate_counted_quantity(counted: i64) -> ValidationResult<()> {
    if counted < 0 {
        return Err(ValidationError::OutOfRange {
            field: "counted_quantity".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Whether approval still owes this item an adjustment movement.
#[inline]
pub fn needs_adjustment(item: &StocktakeItem) -> bool {
    item.variance != 0 && !item.adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_variance_is_signed() {
        assert_eq!(variance(12, 10), 2);
        assert_eq!(variance(8, 10), -2);
        assert_eq!(variance(10, 10), 0);
    }

    #[test]
    fn test_counted_quantity_must_be_non_negative() {
        assert!(validate_counted_quantity(0).is_ok());
        assert!(validate_counted_quantity(5).is_ok());
        assert!(validate_counted_quantity(-1).is_err());
    }

    #[test]
    fn test_needs_adjustment() {
        let item = StocktakeItem {
            id: "i1".to_string(),
            session_id: "s1".to_string(),
            product_id: "p1".to_string(),
            system_quantity: 10,
            counted_quantity: 8,
            variance: -2,
            adjusted: false,
            movement_id: None,
            counted_at: Utc::now(),
        };
        assert!(needs_adjustment(&item));

        let done = StocktakeItem {
            adjusted: true,
            movement_id: Some("m1".to_string()),
            ..item.clone()
        };
        assert!(!needs_adjustment(&done));

        let zero = StocktakeItem {
            counted_quantity: 10,
            variance: 0,
            ..item
        };
        assert!(!needs_adjustment(&zero));
    }
}
