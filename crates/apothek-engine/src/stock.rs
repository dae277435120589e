//! # Stock Operations
//!
//! Current-stock reads, stock receiving, and manual adjustments.
//!
//! ## Receiving
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      receive_stock flow                                 │
//! │                                                                         │
//! │  Validate: batch number, quantity, expiry not in the past,             │
//! │            unit cost plausibility (pack-size aware)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────┐                       │
//! │  │              ONE TRANSACTION                │                       │
//! │  │  INSERT stock_batches (new lot)             │                       │
//! │  │  INSERT stock_movements (purchase, +qty)    │                       │
//! │  └─────────────────────────────────────────────┘                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Alert refresh (short-dated stock shows up immediately)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unit-cost validity is enforced HERE, at write time. The ledger carries
//! whatever receiving accepted; there is no retroactive cost correction
//! pass anywhere in the system.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use apothek_core::validation::{
    validate_batch_number, validate_expiry_date, validate_quantity, derive_unit_cost,
};
use apothek_core::{CoreError, MovementType, StockBatch, StockMovement};
use apothek_db::repository::batch::BatchRepository;
use apothek_db::repository::movement::{generate_movement_id, MovementRepository};

use crate::error::EngineResult;
use crate::Engine;

// =============================================================================
// Request / Response Types
// =============================================================================

/// A product's current stock position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStock {
    /// Ledger quantity (sum of all movements).
    pub quantity: i64,
    /// Batches still holding stock, in FIFO order.
    pub batches: Vec<StockBatch>,
}

/// Parameters for receiving a delivery into a new batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveStockRequest {
    pub product_id: String,
    pub batch_number: String,
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    /// Entered cost in cents. Per-unit when `pack_size` is None, per-pack
    /// otherwise.
    pub cost_cents: i64,
    /// Units per pack, when the supplier invoice prices by pack.
    pub pack_size: Option<i64>,
    pub supplier: Option<String>,
    pub actor_id: String,
}

// =============================================================================
// Operations
// =============================================================================

impl Engine {
    /// Returns a product's ledger quantity and its live batches.
    ///
    /// The two can legitimately disagree (stocktake adjustments move the
    /// ledger without batch attribution); callers that need "what can I
    /// sell" should look at the batches, callers that need "what does the
    /// ledger say" at the quantity.
    pub async fn get_current_stock(&self, product_id: &str) -> EngineResult<CurrentStock> {
        let db = self.database();

        let product = db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let quantity = db.movements().current_quantity(&product.id).await?;
        let batches = db.batches().list_available(&product.id).await?;

        Ok(CurrentStock { quantity, batches })
    }

    /// Receives a delivery: inserts the batch and its purchase movement
    /// in one transaction.
    pub async fn receive_stock(&self, req: ReceiveStockRequest) -> EngineResult<StockBatch> {
        let today = Utc::now().date_naive();

        validate_batch_number(&req.batch_number)?;
        validate_quantity(req.quantity)?;
        validate_expiry_date(req.expiry_date, today)?;

        let db = self.database();
        let product = db
            .products()
            .get_by_id(&req.product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(req.product_id.clone()))?;
        if !product.is_active {
            return Err(CoreError::ProductNotFound(req.product_id.clone()).into());
        }

        let unit_cost_cents =
            derive_unit_cost(req.cost_cents, req.pack_size, product.selling_price_cents)?;

        let now = Utc::now();
        let batch = StockBatch {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            batch_number: req.batch_number.trim().to_string(),
            expiry_date: req.expiry_date,
            unit_cost_cents,
            remaining_quantity: req.quantity,
            initial_quantity: req.quantity,
            supplier: req.supplier.clone(),
            received_at: now,
        };
        let movement = StockMovement {
            id: generate_movement_id(),
            product_id: product.id.clone(),
            batch_id: Some(batch.id.clone()),
            movement_type: MovementType::Purchase,
            quantity: req.quantity,
            unit_cost_cents,
            selling_price_cents: None,
            reason: None,
            reference: None,
            actor_id: req.actor_id.clone(),
            created_at: now,
        };

        let mut tx = db.pool().begin().await.map_err(apothek_db::DbError::from)?;
        BatchRepository::insert_with(&mut tx, &batch).await?;
        MovementRepository::insert_with(&mut tx, &movement).await?;
        tx.commit().await.map_err(apothek_db::DbError::from)?;

        info!(
            product_id = %product.id,
            batch_id = %batch.id,
            batch_number = %batch.batch_number,
            quantity = %req.quantity,
            unit_cost_cents = %unit_cost_cents,
            "Stock received"
        );

        // Short-dated stock should alert right away; a failure here does
        // not fail the receipt, alerts are regenerable.
        if let Err(err) = self.refresh_alerts(Some(&product.id)).await {
            warn!(product_id = %product.id, error = %err, "Alert refresh after receiving failed");
        }

        Ok(batch)
    }

    /// Records a manual corrective movement (damage, theft, found stock).
    ///
    /// Signed quantity: positive adds stock, negative removes. This writes
    /// the ledger only; batch attribution, when known, goes through
    /// `batch_id`.
    pub async fn record_adjustment(
        &self,
        product_id: &str,
        batch_id: Option<&str>,
        quantity: i64,
        reason: &str,
        actor_id: &str,
    ) -> EngineResult<StockMovement> {
        if quantity == 0 {
            return Err(apothek_core::ValidationError::MustBePositive {
                field: "adjustment quantity".to_string(),
            }
            .into());
        }

        let db = self.database();
        let product = db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let movement = StockMovement {
            id: generate_movement_id(),
            product_id: product.id.clone(),
            batch_id: batch_id.map(str::to_string),
            movement_type: MovementType::Adjustment,
            quantity,
            unit_cost_cents: 0,
            selling_price_cents: None,
            reason: Some(reason.to_string()),
            reference: None,
            actor_id: actor_id.to_string(),
            created_at: Utc::now(),
        };

        db.movements().insert(&movement).await?;

        info!(
            product_id = %product.id,
            quantity = %quantity,
            reason = %reason,
            "Manual adjustment recorded"
        );

        Ok(movement)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::DbConfig;
    use apothek_core::Product;
    use chrono::Duration;

    async fn test_engine() -> Engine {
        Engine::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(engine: &Engine, id: &str, price: i64) {
        let now = Utc::now();
        engine
            .database()
            .products()
            .insert(&Product {
                id: id.to_string(),
                sku: format!("SKU-{}", id),
                name: format!("Product {}", id),
                category: None,
                manufacturer: None,
                selling_price_cents: price,
                reorder_point: 10,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    fn receive_req(product_id: &str, quantity: i64, cost_cents: i64) -> ReceiveStockRequest {
        ReceiveStockRequest {
            product_id: product_id.to_string(),
            batch_number: "LOT-001".to_string(),
            expiry_date: Utc::now().date_naive() + Duration::days(365),
            quantity,
            cost_cents,
            pack_size: None,
            supplier: Some("MedSupply".to_string()),
            actor_id: "clerk-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_receive_creates_batch_and_ledger_entry() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;

        let batch = engine.receive_stock(receive_req("p1", 40, 200)).await.unwrap();
        assert_eq!(batch.remaining_quantity, 40);
        assert_eq!(batch.unit_cost_cents, 200);

        let stock = engine.get_current_stock("p1").await.unwrap();
        assert_eq!(stock.quantity, 40);
        assert_eq!(stock.batches.len(), 1);
        assert_eq!(stock.batches[0].id, batch.id);
    }

    #[tokio::test]
    async fn test_receive_rejects_expired_delivery() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;

        let mut req = receive_req("p1", 40, 200);
        req.expiry_date = Utc::now().date_naive() - Duration::days(1);

        let err = engine.receive_stock(req).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));

        // Nothing was written
        let stock = engine.get_current_stock("p1").await.unwrap();
        assert_eq!(stock.quantity, 0);
        assert!(stock.batches.is_empty());
    }

    #[tokio::test]
    async fn test_receive_rejects_pack_cost_as_unit_cost() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 250).await;

        // $120.00 "unit" cost against a $2.50 selling price
        let err = engine
            .receive_stock(receive_req("p1", 40, 12_000))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));

        // With the pack size declared, the per-unit cost derives cleanly
        let mut req = receive_req("p1", 40, 12_000);
        req.pack_size = Some(100);
        let batch = engine.receive_stock(req).await.unwrap();
        assert_eq!(batch.unit_cost_cents, 120);
    }

    #[tokio::test]
    async fn test_manual_adjustment_moves_ledger_only() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;
        engine.receive_stock(receive_req("p1", 10, 200)).await.unwrap();

        engine
            .record_adjustment("p1", None, -3, "damaged in storage", "pharmacist-1")
            .await
            .unwrap();

        let stock = engine.get_current_stock("p1").await.unwrap();
        assert_eq!(stock.quantity, 7);
        // Batch untouched: adjustment had no batch attribution
        assert_eq!(stock.batches[0].remaining_quantity, 10);
    }
}
