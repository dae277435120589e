//! # FIFO Allocation Planning
//!
//! Apportions an outgoing quantity across a product's batches,
//! oldest-expiry-first.
//!
//! ## Planning vs Committing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Allocation Is A Plan, Not A Commit                     │
//! │                                                                         │
//! │  Batches (snapshot):   [A: exp 03-01, rem 5]                           │
//! │                        [B: exp 06-01, rem 5]                           │
//! │                        [C: exp 09-01, rem 5]                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  plan_allocation(product, batches, 7)   ← THIS MODULE (pure)           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  AllocationPlan { deductions: [(A, 5), (B, 2)] }     C untouched       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Orchestrator commits each deduction:                                  │
//! │    conditional batch decrement + sale movement (apothek-engine)        │
//! │                                                                         │
//! │  The planner NEVER mutates. A shortfall is reported before anything    │
//! │  is touched, which is what lets the orchestrator retry and roll back   │
//! │  cleanly.                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//! Candidates are sorted ascending by expiry date; ties are broken by
//! received time, then by id. The same snapshot always yields the same
//! plan, so allocation is repeatable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::StockBatch;

// =============================================================================
// Plan Types
// =============================================================================

/// One planned deduction against a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BatchDeduction {
    pub batch_id: String,
    /// Units to take from this batch. Always `> 0` and never more than the
    /// batch's remaining quantity at planning time.
    pub quantity: i64,
    /// The batch's unit cost, carried onto the sale movement.
    pub unit_cost_cents: i64,
}

/// The full allocation plan for one requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AllocationPlan {
    pub product_id: String,
    pub requested: i64,
    pub deductions: Vec<BatchDeduction>,
}

impl AllocationPlan {
    /// Total quantity across all deductions. Equals `requested` for any
    /// plan returned by [`plan_allocation`].
    pub fn total_quantity(&self) -> i64 {
        self.deductions.iter().map(|d| d.quantity).sum()
    }

    /// Cost basis of the plan in cents (Σ quantity × unit cost).
    pub fn cost_cents(&self) -> i64 {
        self.deductions
            .iter()
            .map(|d| d.quantity * d.unit_cost_cents)
            .sum()
    }
}

// =============================================================================
// Planning
// =============================================================================

/// Plans a FIFO allocation of `requested` units across `batches`.
///
/// ## Rules
/// - Only batches with `remaining_quantity > 0` participate
/// - Batches are consumed ascending by `expiry_date`; ties broken by
///   `received_at`, then `id` (stable, deterministic)
/// - Each deduction takes `min(outstanding, batch.remaining_quantity)`
/// - `requested == 0` is a no-op success with an empty plan
/// - A shortfall returns [`CoreError::InsufficientStock`] and NO deduction
///   list: the caller must not apply a partial plan
///
/// ## Example
/// ```rust
/// use apothek_core::fifo::plan_allocation;
/// use apothek_core::types::StockBatch;
///
/// let batches: Vec<StockBatch> = vec![];
///
/// // Requesting zero units is a no-op plan
/// let plan = plan_allocation("prod-1", &batches, 0).unwrap();
/// assert!(plan.deductions.is_empty());
/// ```
pub fn plan_allocation(
    product_id: &str,
    batches: &[StockBatch],
    requested: i64,
) -> CoreResult<AllocationPlan> {
    if requested < 0 {
        return Err(ValidationError::MustBePositive {
            field: "requested quantity".to_string(),
        }
        .into());
    }

    let mut plan = AllocationPlan {
        product_id: product_id.to_string(),
        requested,
        deductions: Vec::new(),
    };

    if requested == 0 {
        return Ok(plan);
    }

    let mut candidates: Vec<&StockBatch> = batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .collect();
    candidates.sort_by(|a, b| {
        a.expiry_date
            .cmp(&b.expiry_date)
            .then(a.received_at.cmp(&b.received_at))
            .then(a.id.cmp(&b.id))
    });

    let available: i64 = candidates.iter().map(|b| b.remaining_quantity).sum();
    if available < requested {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available,
            requested,
        });
    }

    let mut outstanding = requested;
    for batch in candidates {
        let take = outstanding.min(batch.remaining_quantity);
        plan.deductions.push(BatchDeduction {
            batch_id: batch.id.clone(),
            quantity: take,
            unit_cost_cents: batch.unit_cost_cents,
        });

        outstanding -= take;
        if outstanding == 0 {
            break;
        }
    }

    Ok(plan)
}

/// Returns the first expired batch the plan would consume, if any.
///
/// The plan walks batches in expiry order, so an expired batch in the plan
/// means expired stock is at the front of the queue. The orchestrator
/// refuses such a sale outright rather than silently skipping the batch:
/// expired stock must be cleared by stocktake or adjustment first.
pub fn first_expired_in_plan<'a>(
    plan: &AllocationPlan,
    batches: &'a [StockBatch],
    today: NaiveDate,
) -> Option<&'a StockBatch> {
    plan.deductions.iter().find_map(|d| {
        batches
            .iter()
            .find(|b| b.id == d.batch_id && b.is_expired(today))
    })
}

/// Total allocatable quantity across a batch snapshot.
pub fn available_quantity(batches: &[StockBatch]) -> i64 {
    batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .map(|b| b.remaining_quantity)
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn batch(id: &str, expiry: (i32, u32, u32), remaining: i64, cost: i64) -> StockBatch {
        StockBatch {
            id: id.to_string(),
            product_id: "p1".to_string(),
            batch_number: format!("LOT-{}", id),
            expiry_date: NaiveDate::from_ymd_opt(expiry.0, expiry.1, expiry.2).unwrap(),
            unit_cost_cents: cost,
            remaining_quantity: remaining,
            initial_quantity: remaining,
            supplier: None,
            received_at: Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_fifo_spans_batches_in_expiry_order() {
        // d1 < d2 < d3, quantities [5, 5, 5], request 7
        let batches = vec![
            batch("b3", (2026, 9, 1), 5, 120),
            batch("b1", (2026, 3, 1), 5, 100),
            batch("b2", (2026, 6, 1), 5, 110),
        ];

        let plan = plan_allocation("p1", &batches, 7).unwrap();

        assert_eq!(plan.deductions.len(), 2);
        assert_eq!(plan.deductions[0].batch_id, "b1");
        assert_eq!(plan.deductions[0].quantity, 5);
        assert_eq!(plan.deductions[1].batch_id, "b2");
        assert_eq!(plan.deductions[1].quantity, 2);
        // b3 untouched
        assert!(plan.deductions.iter().all(|d| d.batch_id != "b3"));
        assert_eq!(plan.total_quantity(), 7);
    }

    #[test]
    fn test_shortfall_returns_error_without_deductions() {
        let batches = vec![batch("b1", (2026, 3, 1), 5, 100)];

        let err = plan_allocation("p1", &batches, 6).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_request_is_noop() {
        let batches = vec![batch("b1", (2026, 3, 1), 5, 100)];
        let plan = plan_allocation("p1", &batches, 0).unwrap();
        assert!(plan.deductions.is_empty());
    }

    #[test]
    fn test_negative_request_is_rejected() {
        let err = plan_allocation("p1", &[], -1).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_exhausted_batches_are_skipped() {
        let batches = vec![
            batch("b1", (2026, 3, 1), 0, 100), // exhausted
            batch("b2", (2026, 6, 1), 4, 110),
        ];

        let plan = plan_allocation("p1", &batches, 3).unwrap();
        assert_eq!(plan.deductions.len(), 1);
        assert_eq!(plan.deductions[0].batch_id, "b2");
    }

    #[test]
    fn test_equal_expiry_ties_break_by_received_then_id() {
        let mut early = batch("b2", (2026, 3, 1), 5, 100);
        early.received_at = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let mut late = batch("b1", (2026, 3, 1), 5, 100);
        late.received_at = early.received_at + Duration::days(2);

        let plan = plan_allocation("p1", &[late.clone(), early.clone()], 6).unwrap();
        assert_eq!(plan.deductions[0].batch_id, "b2"); // received first
        assert_eq!(plan.deductions[0].quantity, 5);
        assert_eq!(plan.deductions[1].batch_id, "b1");
        assert_eq!(plan.deductions[1].quantity, 1);

        // Same received_at falls back to id ordering
        late.received_at = early.received_at;
        let plan = plan_allocation("p1", &[late, early], 6).unwrap();
        assert_eq!(plan.deductions[0].batch_id, "b1");
    }

    #[test]
    fn test_never_deducts_beyond_remaining() {
        let batches = vec![
            batch("b1", (2026, 3, 1), 2, 100),
            batch("b2", (2026, 6, 1), 9, 110),
        ];

        let plan = plan_allocation("p1", &batches, 11).unwrap();
        for d in &plan.deductions {
            let b = batches.iter().find(|b| b.id == d.batch_id).unwrap();
            assert!(d.quantity <= b.remaining_quantity);
            assert!(d.quantity > 0);
        }
        assert_eq!(plan.total_quantity(), 11);
    }

    #[test]
    fn test_first_expired_in_plan() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let batches = vec![
            batch("b1", (2026, 3, 1), 5, 100), // expired
            batch("b2", (2026, 6, 1), 5, 110),
        ];

        let plan = plan_allocation("p1", &batches, 7).unwrap();
        let expired = first_expired_in_plan(&plan, &batches, today).unwrap();
        assert_eq!(expired.id, "b1");

        // A plan touching only the fresh batch reports nothing
        let plan = plan_allocation("p1", &batches[1..], 3).unwrap();
        assert!(first_expired_in_plan(&plan, &batches, today).is_none());
    }

    #[test]
    fn test_plan_cost_cents() {
        let batches = vec![
            batch("b1", (2026, 3, 1), 5, 100),
            batch("b2", (2026, 6, 1), 5, 110),
        ];
        let plan = plan_allocation("p1", &batches, 7).unwrap();
        assert_eq!(plan.cost_cents(), 5 * 100 + 2 * 110);
    }
}
