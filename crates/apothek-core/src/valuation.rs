//! # Inventory Valuation
//!
//! Computes the monetary value of current inventory on two bases:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Two Valuation Bases                               │
//! │                                                                         │
//! │  RETAIL BASIS                        COST BASIS                         │
//! │  ────────────                        ──────────                         │
//! │  ledger quantity                     Σ over batches of                  │
//! │    × selling price                     remaining × unit cost            │
//! │                                                                         │
//! │  Source: movement ledger             Source: batch snapshot             │
//! │                                                                         │
//! │  The two bases are computed from DIFFERENT state and may diverge       │
//! │  (e.g., a positive stocktake adjustment raises the ledger quantity     │
//! │  without attributing units to any batch). The divergence is a          │
//! │  property, not a bug: it is preserved, never reconciled here.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Exclusion Rules
//! - A batch id contributes at most once, however often it appears in the
//!   input (fetch pagination can duplicate rows)
//! - Batches with `remaining_quantity <= 0` contribute nothing
//! - Batches with `remaining_quantity > 0` but `unit_cost_cents <= 0` are
//!   excluded AND reported as a data-quality signal
//! - Any term that overflows or goes negative is excluded, not propagated

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Product, StockBatch};

// =============================================================================
// Input / Output Types
// =============================================================================

/// Everything needed to value one product: the product record, its ledger
/// quantity, and a snapshot of its batches.
#[derive(Debug, Clone)]
pub struct ValuationEntry {
    pub product: Product,
    /// Current quantity as reported by the movement ledger.
    pub ledger_quantity: i64,
    pub batches: Vec<StockBatch>,
}

/// Valuation result for a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductValuation {
    pub product_id: String,
    pub product_name: String,
    /// Ledger quantity used for the retail basis.
    pub quantity: i64,
    /// quantity × selling price.
    pub retail_value_cents: i64,
    /// Σ remaining × unit cost over valid, deduplicated batches.
    pub cost_value_cents: i64,
}

/// Aggregate valuation across the whole inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryValuation {
    pub total_retail_cents: i64,
    pub total_cost_cents: i64,
    pub per_product: Vec<ProductValuation>,
    /// Batches excluded from the cost basis for data-quality reasons
    /// (non-positive unit cost while stock remains). Exhausted batches are
    /// not listed; running out is not a data problem.
    pub skipped_batches: Vec<String>,
}

// =============================================================================
// Valuation
// =============================================================================

/// Values the inventory described by `entries`.
///
/// Pure function of its input. The caller (apothek-engine) assembles the
/// entries from the ledger and batch store; batch lists may contain
/// duplicates from paged fetches and are deduplicated by id here.
pub fn value_inventory(entries: &[ValuationEntry]) -> InventoryValuation {
    let mut per_product = Vec::with_capacity(entries.len());
    let mut skipped_batches = Vec::new();
    let mut seen_batches: HashSet<&str> = HashSet::new();

    let mut total_retail: i64 = 0;
    let mut total_cost: i64 = 0;

    for entry in entries {
        let retail = entry
            .product
            .selling_price()
            .checked_extend(entry.ledger_quantity)
            .unwrap_or(Money::zero());

        let mut cost = Money::zero();
        for batch in &entry.batches {
            if !seen_batches.insert(batch.id.as_str()) {
                continue; // already counted under this or another page
            }
            if batch.remaining_quantity <= 0 {
                continue;
            }
            if batch.unit_cost_cents <= 0 {
                skipped_batches.push(batch.id.clone());
                continue;
            }
            match batch.unit_cost().checked_extend(batch.remaining_quantity) {
                Some(value) => cost += value,
                None => skipped_batches.push(batch.id.clone()),
            }
        }

        total_retail = total_retail.saturating_add(retail.cents());
        total_cost = total_cost.saturating_add(cost.cents());

        per_product.push(ProductValuation {
            product_id: entry.product.id.clone(),
            product_name: entry.product.name.clone(),
            quantity: entry.ledger_quantity,
            retail_value_cents: retail.cents(),
            cost_value_cents: cost.cents(),
        });
    }

    InventoryValuation {
        total_retail_cents: total_retail,
        total_cost_cents: total_cost,
        per_product,
        skipped_batches,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn product(id: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            category: None,
            manufacturer: None,
            selling_price_cents: price,
            reorder_point: 10,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn batch(id: &str, product_id: &str, remaining: i64, cost: i64) -> StockBatch {
        StockBatch {
            id: id.to_string(),
            product_id: product_id.to_string(),
            batch_number: format!("LOT-{}", id),
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            unit_cost_cents: cost,
            remaining_quantity: remaining,
            initial_quantity: remaining,
            supplier: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_retail_and_cost_bases() {
        let entries = vec![ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: 10,
            batches: vec![batch("b1", "p1", 6, 200), batch("b2", "p1", 4, 250)],
        }];

        let v = value_inventory(&entries);
        assert_eq!(v.total_retail_cents, 10 * 500);
        assert_eq!(v.total_cost_cents, 6 * 200 + 4 * 250);
        assert_eq!(v.per_product.len(), 1);
        assert!(v.skipped_batches.is_empty());
    }

    #[test]
    fn test_duplicate_batch_counted_once() {
        let b = batch("b1", "p1", 6, 200);
        let once = value_inventory(&[ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: 6,
            batches: vec![b.clone()],
        }]);
        let twice = value_inventory(&[ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: 6,
            batches: vec![b.clone(), b],
        }]);

        assert_eq!(once.total_cost_cents, twice.total_cost_cents);
    }

    #[test]
    fn test_zero_cost_batch_excluded_and_reported() {
        let v = value_inventory(&[ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: 6,
            batches: vec![batch("b1", "p1", 6, 0), batch("b2", "p1", 2, 150)],
        }]);

        assert_eq!(v.total_cost_cents, 2 * 150);
        assert_eq!(v.skipped_batches, vec!["b1".to_string()]);
    }

    #[test]
    fn test_exhausted_batch_excluded_silently() {
        let v = value_inventory(&[ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: 0,
            batches: vec![batch("b1", "p1", 0, 150)],
        }]);

        assert_eq!(v.total_cost_cents, 0);
        assert!(v.skipped_batches.is_empty());
    }

    #[test]
    fn test_bases_may_diverge() {
        // Stocktake raised the ledger to 12 without touching batches
        let v = value_inventory(&[ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: 12,
            batches: vec![batch("b1", "p1", 10, 200)],
        }]);

        assert_eq!(v.per_product[0].retail_value_cents, 12 * 500);
        assert_eq!(v.per_product[0].cost_value_cents, 10 * 200);
        assert_ne!(
            v.per_product[0].retail_value_cents,
            v.per_product[0].cost_value_cents
        );
    }

    #[test]
    fn test_negative_terms_excluded() {
        // A negative ledger quantity must not produce a negative retail value
        let v = value_inventory(&[ValuationEntry {
            product: product("p1", 500),
            ledger_quantity: -3,
            batches: vec![],
        }]);
        assert_eq!(v.total_retail_cents, 0);
    }
}
