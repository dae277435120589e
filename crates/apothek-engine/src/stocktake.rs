//! # Stocktake Reconciliation
//!
//! Drives a physical count session from `counting` through `approved`,
//! turning variances into corrective ledger movements.
//!
//! ## Approval
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       approve_stocktake flow                            │
//! │                                                                         │
//! │  For every item with variance != 0 and adjusted == false:              │
//! │                                                                         │
//! │    ┌─────────────────────────────────────────────┐                     │
//! │    │            ONE TRANSACTION (per item)       │                     │
//! │    │  INSERT stock_movements                     │                     │
//! │    │    (stocktake, quantity = variance,         │                     │
//! │    │     reference = session id)                 │                     │
//! │    │  UPDATE stocktake_items                     │                     │
//! │    │    SET adjusted = 1, movement_id = ...      │                     │
//! │    │    WHERE adjusted = 0                       │                     │
//! │    └─────────────────────────────────────────────┘                     │
//! │                                                                         │
//! │  Items are independent: one item's failure is collected and the rest   │
//! │  proceed. The session then transitions counting → approved.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use apothek_core::stocktake::{needs_adjustment, validate_counted_quantity, variance};
use apothek_core::{
    CoreError, MovementType, StockMovement, StocktakeItem, StocktakeSession, StocktakeStatus,
};
use apothek_db::repository::movement::{generate_movement_id, MovementRepository};
use apothek_db::repository::stocktake::StocktakeRepository;
use apothek_db::DbError;

use crate::error::EngineResult;
use crate::Engine;

// =============================================================================
// Response Types
// =============================================================================

/// Per-item failure during approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StocktakeItemError {
    pub item_id: String,
    pub product_id: String,
    pub error: String,
}

/// Result of approving a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StocktakeApproval {
    pub items_adjusted: usize,
    pub errors: Vec<StocktakeItemError>,
}

// =============================================================================
// Operations
// =============================================================================

impl Engine {
    /// Opens a new counting session.
    pub async fn start_stocktake(&self, created_by: &str) -> EngineResult<StocktakeSession> {
        let session = self.database().stocktakes().create_session(created_by).await?;
        info!(session_id = %session.id, created_by = %created_by, "Stocktake started");
        Ok(session)
    }

    /// Records (or re-records) a physical count for a product.
    ///
    /// The system quantity is captured from the ledger at THIS moment and
    /// the variance derived from it; whatever variance the caller might
    /// have computed is ignored.
    pub async fn record_count(
        &self,
        session_id: &str,
        product_id: &str,
        counted_quantity: i64,
    ) -> EngineResult<StocktakeItem> {
        validate_counted_quantity(counted_quantity)?;

        let db = self.database();

        let session = db
            .stocktakes()
            .get_session(session_id)
            .await?
            .ok_or_else(|| DbError::not_found("StocktakeSession", session_id))?;
        if session.status != StocktakeStatus::Counting {
            return Err(CoreError::InvalidSessionStatus {
                session_id: session_id.to_string(),
                current_status: format!("{:?}", session.status),
            }
            .into());
        }

        let product = db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let system_quantity = db.movements().current_quantity(&product.id).await?;

        let item = StocktakeItem {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            product_id: product.id.clone(),
            system_quantity,
            counted_quantity,
            variance: variance(counted_quantity, system_quantity),
            adjusted: false,
            movement_id: None,
            counted_at: Utc::now(),
        };
        db.stocktakes().upsert_item(&item).await?;

        // The upsert keeps the original row id on re-count; return the row
        // as stored
        let stored = db
            .stocktakes()
            .get_item_for_product(session_id, &product.id)
            .await?
            .ok_or_else(|| DbError::not_found("StocktakeItem", &item.id))?;

        Ok(stored)
    }

    /// Abandons a counting session without emitting any adjustment.
    pub async fn cancel_stocktake(&self, session_id: &str) -> EngineResult<()> {
        self.database().stocktakes().cancel_session(session_id).await?;
        info!(session_id = %session_id, "Stocktake cancelled");
        Ok(())
    }

    /// Approves a session: one corrective movement per non-zero-variance
    /// item, then the counting → approved transition.
    ///
    /// ## Per-Item Independence
    /// Each item's movement + adjusted flag land in their own transaction.
    /// A failing item is reported in `errors` and does not block the
    /// others; its variance can be reconciled manually afterwards.
    pub async fn approve_stocktake(&self, session_id: &str) -> EngineResult<StocktakeApproval> {
        let db = self.database();

        let session = db
            .stocktakes()
            .get_session(session_id)
            .await?
            .ok_or_else(|| DbError::not_found("StocktakeSession", session_id))?;
        if session.status != StocktakeStatus::Counting {
            return Err(CoreError::InvalidSessionStatus {
                session_id: session_id.to_string(),
                current_status: format!("{:?}", session.status),
            }
            .into());
        }

        let items = db.stocktakes().list_items(session_id).await?;

        let mut items_adjusted = 0;
        let mut errors = Vec::new();

        for item in items.iter().filter(|i| needs_adjustment(i)) {
            let movement = StockMovement {
                id: generate_movement_id(),
                product_id: item.product_id.clone(),
                batch_id: None,
                movement_type: MovementType::Stocktake,
                // Sign-preserving: positive variance adds stock
                quantity: item.variance,
                unit_cost_cents: 0,
                selling_price_cents: None,
                reason: Some("stocktake_variance".to_string()),
                reference: Some(session_id.to_string()),
                actor_id: session.created_by.clone(),
                created_at: Utc::now(),
            };

            let applied: Result<(), DbError> = async {
                let mut tx = db.pool().begin().await.map_err(DbError::from)?;
                MovementRepository::insert_with(&mut tx, &movement).await?;
                StocktakeRepository::mark_item_adjusted_with(&mut tx, &item.id, &movement.id)
                    .await?;
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            .await;

            match applied {
                Ok(()) => items_adjusted += 1,
                Err(err) => {
                    warn!(
                        session_id = %session_id,
                        item_id = %item.id,
                        product_id = %item.product_id,
                        error = %err,
                        "Stocktake item adjustment failed"
                    );
                    errors.push(StocktakeItemError {
                        item_id: item.id.clone(),
                        product_id: item.product_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        db.stocktakes().approve_session(session_id).await?;

        info!(
            target: "audit",
            session_id = %session_id,
            items_adjusted,
            errors = errors.len(),
            "Stocktake approved"
        );

        Ok(StocktakeApproval {
            items_adjusted,
            errors,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
