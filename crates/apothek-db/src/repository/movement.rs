//! # Movement Ledger Repository
//!
//! The append-only stock movement ledger. This table is the source of
//! truth for "how many units of product X exist".
//!
//! ## The Ledger Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Derived State, Not Stored Counters                      │
//! │                                                                         │
//! │  stock_movements                                                        │
//! │  ┌──────────┬──────────┬──────┐                                        │
//! │  │ purchase │ +100     │ ...  │                                        │
//! │  │ sale     │ -3       │ ...  │                                        │
//! │  │ sale     │ -2       │ ...  │                                        │
//! │  │ stocktake│ -1       │ ...  │                                        │
//! │  └──────────┴──────────┴──────┘                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  current_quantity = SUM(quantity) = 94                                 │
//! │                                                                         │
//! │  • INSERT only - a correction is a new movement                        │
//! │  • SUM is commutative - concurrent appends need no global order        │
//! │  • Display order (most recent first) is separate from aggregation      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use apothek_core::StockMovement;

/// Repository for the append-only movement ledger.
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Current quantity of a product: the sum of all its movement
    /// quantities.
    ///
    /// ## Order Independence
    /// Pure SUM - the result does not depend on insertion order, so
    /// concurrent appends from overlapping sales cannot corrupt it.
    pub async fn current_quantity(&self, product_id: &str) -> DbResult<i64> {
        let quantity: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM stock_movements
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(quantity)
    }

    /// Appends a movement to the ledger.
    ///
    /// Side effect only: no other row is touched. Movements that must land
    /// together with a batch mutation go through [`Self::insert_with`]
    /// inside the caller's transaction.
    pub async fn insert(&self, movement: &StockMovement) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut conn, movement).await
    }

    /// Appends a movement on an existing connection/transaction.
    pub async fn insert_with(
        conn: &mut SqliteConnection,
        movement: &StockMovement,
    ) -> DbResult<()> {
        debug!(
            id = %movement.id,
            product_id = %movement.product_id,
            quantity = %movement.quantity,
            movement_type = ?movement.movement_type,
            "Appending stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, batch_id, movement_type,
                quantity, unit_cost_cents, selling_price_cents,
                reason, reference, actor_id, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11
            )
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(&movement.batch_id)
        .bind(movement.movement_type)
        .bind(movement.quantity)
        .bind(movement.unit_cost_cents)
        .bind(movement.selling_price_cents)
        .bind(&movement.reason)
        .bind(&movement.reference)
        .bind(&movement.actor_id)
        .bind(movement.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Lists movements for a product, most recent first (display order).
    pub async fn list_for_product(
        &self,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT
                id, product_id, batch_id, movement_type,
                quantity, unit_cost_cents, selling_price_cents,
                reason, reference, actor_id, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Lists movements carrying a given reference (sale id, stocktake
    /// session id).
    pub async fn list_by_reference(&self, reference: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT
                id, product_id, batch_id, movement_type,
                quantity, unit_cost_cents, selling_price_cents,
                reason, reference, actor_id, created_at
            FROM stock_movements
            WHERE reference = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Distinct product ids that have at least one movement.
    ///
    /// ## Usage
    /// Valuation and refresh-all-alerts iterate products that ever held
    /// stock.
    pub async fn product_ids_with_movements(&self) -> DbResult<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT product_id FROM stock_movements")
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }
}

/// Helper to generate a new movement ID.
pub fn generate_movement_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
