//! # Valuation Service
//!
//! Assembles the valuation input (products, ledger quantities, batch
//! snapshots) and delegates the arithmetic to apothek-core.
//!
//! The ledger quantity and the batch snapshot are fetched separately and
//! may be mutually stale; the resulting retail/cost divergence is part of
//! the valuation contract, not something this service papers over.

use tracing::{info, warn};

use apothek_core::valuation::{value_inventory, InventoryValuation, ValuationEntry};

use crate::error::EngineResult;
use crate::Engine;

/// Page size for the product sweep.
const VALUATION_PAGE_SIZE: u32 = 10_000;

impl Engine {
    /// Values the active catalogue on both bases.
    ///
    /// ## Returns
    /// Totals plus per-product rows; batches excluded for data-quality
    /// reasons (stock remaining but no positive unit cost) come back in
    /// `skipped_batches` for follow-up.
    pub async fn inventory_valuation(&self) -> EngineResult<InventoryValuation> {
        let db = self.database();

        let products = db.products().list_active(VALUATION_PAGE_SIZE).await?;

        let mut entries = Vec::with_capacity(products.len());
        for product in products {
            let ledger_quantity = db.movements().current_quantity(&product.id).await?;
            let batches = db.batches().list_for_product(&product.id).await?;
            entries.push(ValuationEntry {
                product,
                ledger_quantity,
                batches,
            });
        }

        let valuation = value_inventory(&entries);

        if !valuation.skipped_batches.is_empty() {
            warn!(
                skipped = valuation.skipped_batches.len(),
                "Batches excluded from cost valuation (data quality)"
            );
        }
        info!(
            products = valuation.per_product.len(),
            total_retail_cents = valuation.total_retail_cents,
            total_cost_cents = valuation.total_cost_cents,
            "Inventory valued"
        );

        Ok(valuation)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
