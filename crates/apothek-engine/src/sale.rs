//! # Sale Transaction Orchestrator
//!
//! Composes the FIFO allocator, the movement ledger and the alert
//! generator into one logical sale with compensating rollback.
//!
//! ## The Saga
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │           Planning → Allocating → Committing → Completed                │
//! │                                      │                                  │
//! │                                      └──────→ RolledBack                │
//! │                                                                         │
//! │  PLANNING (pure reads)                                                 │
//! │    For every line item: FIFO-plan against a snapshot and refuse the    │
//! │    whole sale if the plan would dispense an expired batch.             │
//! │                                                                         │
//! │  ALLOCATING + COMMITTING (per line, fresh snapshot)                    │
//! │    Re-plan against current batches - earlier lines' deductions are     │
//! │    already visible - then commit each deduction as an atomic pair:     │
//! │                                                                         │
//! │    ┌─────────────────────────────────────────────┐                     │
//! │    │              ONE TRANSACTION                │                     │
//! │    │  UPDATE stock_batches (conditional - qty)   │                     │
//! │    │  INSERT stock_movements (sale, -qty)        │                     │
//! │    └─────────────────────────────────────────────┘                     │
//! │                                                                         │
//! │    Every committed pair is journaled as an AppliedStep.                │
//! │                                                                         │
//! │  ON SUCCESS: insert sale + item snapshots, refresh alerts, audit log.  │
//! │                                                                         │
//! │  ON FAILURE: compensate every journaled step - per batch, grouped      │
//! │    and summed: add the quantity back AND write a reversing             │
//! │    adjustment movement, again as one transaction, so the ledger        │
//! │    stays conservative. Compensation is best effort; what it cannot     │
//! │    restore is reported as CompensationFailure with the owed list.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no distributed transaction manager underneath: the guarantee
//! to the caller is "all writes landed" or "we compensated and told you
//! exactly how far we got".

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use apothek_core::fifo::{first_expired_in_plan, plan_allocation, BatchDeduction};
use apothek_core::validation::validate_quantity;
use apothek_core::{
    CoreError, MovementType, PaymentMethod, Product, Sale, SaleItem, StockMovement,
    ValidationError,
};
use apothek_db::repository::batch::BatchRepository;
use apothek_db::repository::movement::{generate_movement_id, MovementRepository};
use apothek_db::repository::sale::{generate_receipt_number, SaleRepository};
use apothek_db::{Database, DbError};

use crate::error::{BatchRestitution, SaleAbortCause, SaleError};
use crate::Engine;

// =============================================================================
// Request / Response Types
// =============================================================================

/// One line of a sale request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// The committed sale, ready for receipt printing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleReceipt {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Saga Journal
// =============================================================================

/// A step the saga has durably applied and may need to compensate.
///
/// One variant per step type; each carries what its compensation needs.
/// New movement kinds register their own variant + compensation arm here
/// instead of growing ad hoc rollback code elsewhere.
#[derive(Debug, Clone)]
enum AppliedStep {
    /// A batch decrement + sale movement pair that committed.
    Deduction {
        product_id: String,
        batch_id: String,
        quantity: i64,
    },
}

/// Journal of applied steps for one sale, with the compensation routine.
struct SaleSaga<'a> {
    db: &'a Database,
    sale_id: String,
    actor_id: String,
    applied: Vec<AppliedStep>,
}

impl<'a> SaleSaga<'a> {
    fn new(db: &'a Database, sale_id: &str, actor_id: &str) -> Self {
        SaleSaga {
            db,
            sale_id: sale_id.to_string(),
            actor_id: actor_id.to_string(),
            applied: Vec::new(),
        }
    }

    fn has_applied_steps(&self) -> bool {
        !self.applied.is_empty()
    }

    /// Commits one planned deduction as an atomic pair and journals it.
    async fn apply_deduction(
        &mut self,
        product: &Product,
        deduction: &BatchDeduction,
    ) -> Result<(), DbError> {
        let movement = StockMovement {
            id: generate_movement_id(),
            product_id: product.id.clone(),
            batch_id: Some(deduction.batch_id.clone()),
            movement_type: MovementType::Sale,
            quantity: -deduction.quantity,
            unit_cost_cents: deduction.unit_cost_cents,
            selling_price_cents: Some(product.selling_price_cents),
            reason: None,
            reference: Some(self.sale_id.clone()),
            actor_id: self.actor_id.clone(),
            created_at: Utc::now(),
        };

        let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
        BatchRepository::deduct_remaining_with(&mut tx, &deduction.batch_id, deduction.quantity)
            .await?;
        MovementRepository::insert_with(&mut tx, &movement).await?;
        tx.commit().await.map_err(DbError::from)?;

        debug!(
            sale_id = %self.sale_id,
            batch_id = %deduction.batch_id,
            quantity = %deduction.quantity,
            "Deduction committed"
        );

        self.applied.push(AppliedStep::Deduction {
            product_id: product.id.clone(),
            batch_id: deduction.batch_id.clone(),
            quantity: deduction.quantity,
        });

        Ok(())
    }

    /// Compensates every journaled step, returning what could not be
    /// restored.
    ///
    /// Deductions are grouped and summed per batch before writing, so a
    /// sale that touched one batch through several lines restores it with
    /// a single pair of writes. Each restitution is itself an atomic pair
    /// (quantity add-back + reversing adjustment movement) to keep the
    /// ledger conservative.
    async fn compensate(&mut self) -> Vec<BatchRestitution> {
        // Group and sum per batch
        let mut per_batch: BTreeMap<String, (String, i64)> = BTreeMap::new();
        for step in &self.applied {
            match step {
                AppliedStep::Deduction {
                    product_id,
                    batch_id,
                    quantity,
                } => {
                    per_batch
                        .entry(batch_id.clone())
                        .and_modify(|(_, q)| *q += quantity)
                        .or_insert_with(|| (product_id.clone(), *quantity));
                }
            }
        }

        let mut owed = Vec::new();

        for (batch_id, (product_id, quantity)) in per_batch {
            let movement = StockMovement {
                id: generate_movement_id(),
                product_id: product_id.clone(),
                batch_id: Some(batch_id.clone()),
                movement_type: MovementType::Adjustment,
                quantity,
                unit_cost_cents: 0,
                selling_price_cents: None,
                reason: Some("sale_rollback".to_string()),
                reference: Some(self.sale_id.clone()),
                actor_id: self.actor_id.clone(),
                created_at: Utc::now(),
            };

            let restored: Result<(), DbError> = async {
                let mut tx = self.db.pool().begin().await.map_err(DbError::from)?;
                BatchRepository::restore_remaining_with(&mut tx, &batch_id, quantity).await?;
                MovementRepository::insert_with(&mut tx, &movement).await?;
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            .await;

            match restored {
                Ok(()) => {
                    warn!(
                        sale_id = %self.sale_id,
                        batch_id = %batch_id,
                        quantity = %quantity,
                        "Sale compensation restored batch"
                    );
                }
                Err(err) => {
                    // Manual reconciliation data: batch id and quantity owed
                    error!(
                        sale_id = %self.sale_id,
                        batch_id = %batch_id,
                        quantity_owed = %quantity,
                        error = %err,
                        "SALE COMPENSATION FAILED - manual reconciliation required"
                    );
                    owed.push(BatchRestitution { batch_id, quantity });
                }
            }
        }

        self.applied.clear();
        owed
    }
}

// =============================================================================
// Orchestration
// =============================================================================

impl Engine {
    /// Processes a sale end to end.
    ///
    /// ## Stages
    /// 1. Validation - malformed input is rejected before anything runs
    /// 2. Planning - every line FIFO-planned against a snapshot; a plan
    ///    that would dispense expired stock rejects the whole sale
    /// 3. Allocating/Committing - per line, re-planned against fresh
    ///    batches and committed deduction by deduction
    /// 4. Sale record + item snapshots, alert refresh, audit entry
    ///
    /// ## Failure Behavior
    /// See [`SaleError`]: rejection means nothing happened; a mid-commit
    /// failure triggers compensation of every applied step.
    pub async fn process_sale(
        &self,
        lines: &[SaleLine],
        payment_method: PaymentMethod,
        cashier_id: &str,
    ) -> Result<SaleReceipt, SaleError> {
        let db = self.database();
        let today = Utc::now().date_naive();

        // ---------------------------------------------------------------------
        // Stage 1: validation (pure, nothing happened on failure)
        // ---------------------------------------------------------------------
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "line items".to_string(),
            }
            .into());
        }
        for line in lines {
            validate_quantity(line.quantity)?;
        }

        let mut products: Vec<Product> = Vec::with_capacity(lines.len());
        for line in lines {
            let product = db
                .products()
                .get_by_id(&line.product_id)
                .await
                .map_err(|e| SaleError::RolledBack { cause: e.into() })?
                .filter(|p| p.is_active)
                .ok_or_else(|| {
                    SaleError::Rejected(CoreError::ProductNotFound(line.product_id.clone()))
                })?;
            products.push(product);
        }

        // ---------------------------------------------------------------------
        // Stage 2: planning (pure reads; expired stock blocks the sale)
        // ---------------------------------------------------------------------
        for (line, product) in lines.iter().zip(&products) {
            let batches = db
                .batches()
                .list_available(&product.id)
                .await
                .map_err(|e| SaleError::RolledBack { cause: e.into() })?;

            let plan = plan_allocation(&product.id, &batches, line.quantity)
                .map_err(SaleError::Rejected)?;

            if let Some(expired) = first_expired_in_plan(&plan, &batches, today) {
                return Err(SaleError::Rejected(CoreError::ExpiredStock {
                    product_id: product.id.clone(),
                    batch_id: expired.id.clone(),
                    expiry_date: expired.expiry_date,
                }));
            }
        }

        // ---------------------------------------------------------------------
        // Stage 3: allocate + commit per line
        // ---------------------------------------------------------------------
        let sale_id = Uuid::new_v4().to_string();
        let mut saga = SaleSaga::new(db, &sale_id, cashier_id);
        let now = Utc::now();

        let mut items: Vec<SaleItem> = Vec::with_capacity(lines.len());
        let mut total_cents: i64 = 0;

        for (line, product) in lines.iter().zip(&products) {
            // Fresh snapshot: earlier lines' committed deductions are visible
            let step = async {
                let batches = db
                    .batches()
                    .list_available(&product.id)
                    .await
                    .map_err(SaleAbortCause::from)?;
                let plan = plan_allocation(&product.id, &batches, line.quantity)
                    .map_err(SaleAbortCause::from)?;
                if let Some(expired) = first_expired_in_plan(&plan, &batches, today) {
                    return Err(SaleAbortCause::Domain(CoreError::ExpiredStock {
                        product_id: product.id.clone(),
                        batch_id: expired.id.clone(),
                        expiry_date: expired.expiry_date,
                    }));
                }
                Ok(plan)
            }
            .await;

            let plan = match step {
                Ok(plan) => plan,
                Err(cause) => return Err(self.abort_sale(saga, cause).await),
            };

            for deduction in &plan.deductions {
                if let Err(err) = saga.apply_deduction(product, deduction).await {
                    return Err(self.abort_sale(saga, err.into()).await);
                }
            }

            let line_total = product.selling_price_cents * line.quantity;
            total_cents += line_total;
            items.push(SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.selling_price_cents,
                quantity: line.quantity,
                line_total_cents: line_total,
                created_at: now,
            });
        }

        // ---------------------------------------------------------------------
        // Stage 4: sale record + snapshots in one transaction
        // ---------------------------------------------------------------------
        let sale = Sale {
            id: sale_id.clone(),
            receipt_number: generate_receipt_number(),
            payment_method,
            total_cents,
            cashier_id: cashier_id.to_string(),
            created_at: now,
        };

        let record: Result<(), DbError> = async {
            let mut tx = db.pool().begin().await.map_err(DbError::from)?;
            SaleRepository::insert_sale_with(&mut tx, &sale).await?;
            for item in &items {
                SaleRepository::add_item_with(&mut tx, item).await?;
            }
            tx.commit().await.map_err(DbError::from)?;
            Ok(())
        }
        .await;

        if let Err(err) = record {
            return Err(self.abort_sale(saga, err.into()).await);
        }

        // Alerts are derived state; refresh failures must not undo a
        // committed sale
        for product in &products {
            if let Err(err) = self.refresh_alerts(Some(&product.id)).await {
                warn!(product_id = %product.id, error = %err, "Alert refresh after sale failed");
            }
        }

        info!(
            target: "audit",
            sale_id = %sale.id,
            receipt_number = %sale.receipt_number,
            cashier_id = %cashier_id,
            total_cents = %total_cents,
            items = items.len(),
            "Sale completed"
        );

        Ok(SaleReceipt { sale, items })
    }

    /// Turns a mid-sale failure into the caller-visible outcome,
    /// compensating whatever the saga had applied.
    async fn abort_sale(&self, mut saga: SaleSaga<'_>, cause: SaleAbortCause) -> SaleError {
        if !saga.has_applied_steps() {
            // Nothing durable happened; domain failures surface as plain
            // rejections
            return match cause {
                SaleAbortCause::Domain(core) => SaleError::Rejected(core),
                SaleAbortCause::Persistence(_) => SaleError::RolledBack { cause },
            };
        }

        let owed = saga.compensate().await;
        if owed.is_empty() {
            SaleError::RolledBack { cause }
        } else {
            SaleError::CompensationFailure { cause, owed }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DbConfig;
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

    async fn seed_batch(engine: &Engine, id: &str, product_id: &str, days: i64, remaining: i64) {
        engine
            .database()
            .batches()
            .insert(&apothek_core::StockBatch {
                id: id.to_string(),
                product_id: product_id.to_string(),
                batch_number: format!("LOT-{}", id),
                expiry_date: Utc::now().date_naive() + Duration::days(days),
                unit_cost_cents: 100,
                remaining_quantity: remaining,
                initial_quantity: remaining,
                supplier: None,
                received_at: Utc::now(),
            })
            .await
            .unwrap();
        // Ledger entry matching the seeded batch
        engine
            .database()
            .movements()
            .insert(&StockMovement {
                id: generate_movement_id(),
                product_id: product_id.to_string(),
                batch_id: Some(id.to_string()),
                movement_type: MovementType::Purchase,
                quantity: remaining,
                unit_cost_cents: 100,
                selling_price_cents: None,
                reason: None,
                reference: None,
                actor_id: "seed".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn remaining(engine: &Engine, batch_id: &str) -> i64 {
        engine
            .database()
            .batches()
            .get_by_id(batch_id)
            .await
            .unwrap()
            .unwrap()
            .remaining_quantity
    }

    #[tokio::test]
    async fn test_successful_sale_deducts_fifo_and_records_everything() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;
        seed_batch(&engine, "b-soon", "p1", 100, 5).await;
        seed_batch(&engine, "b-late", "p1", 300, 5).await;

        let receipt = engine
            .process_sale(
                &[SaleLine {
                    product_id: "p1".to_string(),
                    quantity: 7,
                }],
                PaymentMethod::Cash,
                "cashier-1",
            )
            .await
            .unwrap();

        assert_eq!(receipt.sale.total_cents, 7 * 500);
        assert_eq!(receipt.items.len(), 1);

        // FIFO: earliest expiry drained first
        assert_eq!(remaining(&engine, "b-soon").await, 0);
        assert_eq!(remaining(&engine, "b-late").await, 3);

        // Ledger went down by 7
        let quantity = engine
            .database()
            .movements()
            .current_quantity("p1")
            .await
            .unwrap();
        assert_eq!(quantity, 3);

        // Sale movements reference the sale and carry batch costs
        let movements = engine
            .database()
            .movements()
            .list_by_reference(&receipt.sale.id)
            .await
            .unwrap();
        assert_eq!(movements.len(), 2);
        assert!(movements.iter().all(|m| m.movement_type == MovementType::Sale));
        assert_eq!(movements.iter().map(|m| m.quantity).sum::<i64>(), -7);

        // Sale record exists
        assert!(engine
            .database()
            .sales()
            .get_by_id(&receipt.sale.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_without_mutation() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;
        seed_batch(&engine, "b1", "p1", 100, 5).await;

        let err = engine
            .process_sale(
                &[SaleLine {
                    product_id: "p1".to_string(),
                    quantity: 6,
                }],
                PaymentMethod::Cash,
                "cashier-1",
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(remaining(&engine, "b1").await, 5);
        assert_eq!(
            engine
                .database()
                .movements()
                .current_quantity("p1")
                .await
                .unwrap(),
            5
        );
    }

    #[tokio::test]
    async fn test_expired_front_batch_blocks_sale() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;
        seed_batch(&engine, "b-expired", "p1", -5, 5).await;
        seed_batch(&engine, "b-fresh", "p1", 200, 5).await;

        let err = engine
            .process_sale(
                &[SaleLine {
                    product_id: "p1".to_string(),
                    quantity: 2,
                }],
                PaymentMethod::Cash,
                "cashier-1",
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::ExpiredStock { .. })
        ));
        assert_eq!(remaining(&engine, "b-expired").await, 5);
        assert_eq!(remaining(&engine, "b-fresh").await, 5);
    }

    #[tokio::test]
    async fn test_mid_sale_failure_restores_first_line() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;
        seed_batch(&engine, "b1", "p1", 100, 5).await;

        // Two lines against the same 5-unit batch: line 1 drains it, the
        // fresh snapshot for line 2 comes up short mid-sale
        let err = engine
            .process_sale(
                &[
                    SaleLine {
                        product_id: "p1".to_string(),
                        quantity: 5,
                    },
                    SaleLine {
                        product_id: "p1".to_string(),
                        quantity: 3,
                    },
                ],
                PaymentMethod::Cash,
                "cashier-1",
            )
            .await
            .unwrap_err();

        match &err {
            SaleError::RolledBack { cause } => {
                assert!(matches!(
                    cause,
                    SaleAbortCause::Domain(CoreError::InsufficientStock { .. })
                ));
            }
            other => panic!("expected RolledBack, got {other:?}"),
        }

        // First line's batch restored to its pre-sale value
        assert_eq!(remaining(&engine, "b1").await, 5);

        // Ledger conservation: sale movement + reversing adjustment net out
        assert_eq!(
            engine
                .database()
                .movements()
                .current_quantity("p1")
                .await
                .unwrap(),
            5
        );

        // No sale record exists
        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(engine.database().pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    #[tokio::test]
    async fn test_rollback_groups_deductions_per_batch() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;
        seed_batch(&engine, "b1", "p1", 100, 4).await;
        seed_batch(&engine, "b2", "p1", 200, 4).await;

        // Both lines plan fine against the initial snapshot (8 available),
        // but line 1 spans b1+b2 and leaves only 2 for line 2's fresh plan
        let err = engine
            .process_sale(
                &[
                    SaleLine {
                        product_id: "p1".to_string(),
                        quantity: 6,
                    },
                    SaleLine {
                        product_id: "p1".to_string(),
                        quantity: 3,
                    },
                ],
                PaymentMethod::Card,
                "cashier-1",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SaleError::RolledBack { .. }));
        assert_eq!(remaining(&engine, "b1").await, 4);
        assert_eq!(remaining(&engine, "b2").await, 4);

        // One reversing adjustment per affected batch, not per deduction
        let movements = engine
            .database()
            .movements()
            .list_for_product("p1", 50)
            .await
            .unwrap();
        let rollbacks: Vec<_> = movements
            .iter()
            .filter(|m| m.reason.as_deref() == Some("sale_rollback"))
            .collect();
        assert_eq!(rollbacks.len(), 2);
        assert!(rollbacks.iter().all(|m| m.quantity > 0));
    }

    #[tokio::test]
    async fn test_zero_and_negative_quantities_rejected() {
        let engine = test_engine().await;
        seed_product(&engine, "p1", 500).await;

        for quantity in [0, -2] {
            let err = engine
                .process_sale(
                    &[SaleLine {
                        product_id: "p1".to_string(),
                        quantity,
                    }],
                    PaymentMethod::Cash,
                    "cashier-1",
                )
                .await
                .unwrap_err();
            assert!(matches!(err, SaleError::Rejected(_)));
        }

        let err = engine
            .process_sale(&[], PaymentMethod::Cash, "cashier-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let engine = test_engine().await;

        let err = engine
            .process_sale(
                &[SaleLine {
                    product_id: "ghost".to_string(),
                    quantity: 1,
                }],
                PaymentMethod::Cash,
                "cashier-1",
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SaleError::Rejected(CoreError::ProductNotFound(_))
        ));
    }
}
