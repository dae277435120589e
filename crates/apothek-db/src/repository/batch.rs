//! # Stock Batch Repository
//!
//! Batch store operations, including the one mutation in the whole system
//! that must be serialized: the remaining-quantity decrement.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Why Not A Blind Overwrite?                              │
//! │                                                                         │
//! │  Two sales allocate from the same batch (remaining = 5):               │
//! │                                                                         │
//! │  ❌ WRONG: read-modify-write                                           │
//! │     Sale A reads 5, writes 5-3 = 2                                     │
//! │     Sale B reads 5, writes 5-4 = 1   ← A's deduction is LOST           │
//! │                                                                         │
//! │  ✅ CORRECT: conditional delta update                                  │
//! │     UPDATE stock_batches                                               │
//! │     SET remaining_quantity = remaining_quantity - ?qty                 │
//! │     WHERE id = ?id AND remaining_quantity >= ?qty                      │
//! │                                                                         │
//! │     Sale A: 5 → 2 (1 row affected)                                     │
//! │     Sale B: guard 2 >= 4 fails (0 rows) → Conflict → rollback          │
//! │                                                                         │
//! │  The guard makes over-deduction impossible regardless of interleaving. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use apothek_core::StockBatch;

/// Repository for stock batch database operations.
#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    /// Creates a new BatchRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Gets a batch by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<StockBatch>> {
        let batch = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT
                id, product_id, batch_number, expiry_date,
                unit_cost_cents, remaining_quantity, initial_quantity,
                supplier, received_at
            FROM stock_batches
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }

    /// Lists a product's batches that still hold stock, in FIFO order
    /// (ascending expiry, ties by received time then id).
    ///
    /// This is the allocator's input snapshot. It may be stale by the time
    /// a deduction commits; the conditional decrement covers that gap.
    pub async fn list_available(&self, product_id: &str) -> DbResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT
                id, product_id, batch_number, expiry_date,
                unit_cost_cents, remaining_quantity, initial_quantity,
                supplier, received_at
            FROM stock_batches
            WHERE product_id = ?1 AND remaining_quantity > 0
            ORDER BY expiry_date, received_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Lists all batches for a product, including exhausted ones.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<StockBatch>> {
        let batches = sqlx::query_as::<_, StockBatch>(
            r#"
            SELECT
                id, product_id, batch_number, expiry_date,
                unit_cost_cents, remaining_quantity, initial_quantity,
                supplier, received_at
            FROM stock_batches
            WHERE product_id = ?1
            ORDER BY expiry_date, received_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Inserts a new batch.
    pub async fn insert(&self, batch: &StockBatch) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_with(&mut conn, batch).await
    }

    /// Inserts a new batch on an existing connection/transaction.
    pub async fn insert_with(conn: &mut SqliteConnection, batch: &StockBatch) -> DbResult<()> {
        debug!(
            id = %batch.id,
            product_id = %batch.product_id,
            batch_number = %batch.batch_number,
            "Inserting stock batch"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_batches (
                id, product_id, batch_number, expiry_date,
                unit_cost_cents, remaining_quantity, initial_quantity,
                supplier, received_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9
            )
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_id)
        .bind(&batch.batch_number)
        .bind(batch.expiry_date)
        .bind(batch.unit_cost_cents)
        .bind(batch.remaining_quantity)
        .bind(batch.initial_quantity)
        .bind(&batch.supplier)
        .bind(batch.received_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Conditionally deducts `quantity` units from a batch.
    ///
    /// ## Guard
    /// The UPDATE only matches while `remaining_quantity >= quantity`.
    /// Zero rows affected means either the batch is gone (NotFound) or a
    /// concurrent writer drained it first (Conflict). Both are reported;
    /// the sale path compensates on either.
    pub async fn deduct_remaining(&self, batch_id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::deduct_remaining_with(&mut conn, batch_id, quantity).await
    }

    /// Conditional deduction on an existing connection/transaction.
    pub async fn deduct_remaining_with(
        conn: &mut SqliteConnection,
        batch_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(batch_id = %batch_id, quantity = %quantity, "Deducting from batch");

        let result = sqlx::query(
            r#"
            UPDATE stock_batches
            SET remaining_quantity = remaining_quantity - ?2
            WHERE id = ?1 AND remaining_quantity >= ?2
            "#,
        )
        .bind(batch_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            let exists: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM stock_batches WHERE id = ?1")
                    .bind(batch_id)
                    .fetch_one(conn)
                    .await?;
            return Err(if exists == 0 {
                DbError::not_found("Batch", batch_id)
            } else {
                DbError::conflict("Batch", batch_id)
            });
        }

        Ok(())
    }

    /// Adds `quantity` units back to a batch (compensating rollback).
    ///
    /// No upper guard: restitution must always succeed if the row exists,
    /// even if a stocktake moved the quantity in between.
    pub async fn restore_remaining(&self, batch_id: &str, quantity: i64) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::restore_remaining_with(&mut conn, batch_id, quantity).await
    }

    /// Restitution on an existing connection/transaction.
    pub async fn restore_remaining_with(
        conn: &mut SqliteConnection,
        batch_id: &str,
        quantity: i64,
    ) -> DbResult<()> {
        debug!(batch_id = %batch_id, quantity = %quantity, "Restoring batch quantity");

        let result = sqlx::query(
            r#"
            UPDATE stock_batches
            SET remaining_quantity = remaining_quantity + ?2
            WHERE id = ?1
            "#,
        )
        .bind(batch_id)
        .bind(quantity)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Batch", batch_id));
        }

        Ok(())
    }
}

/// Helper to generate a new batch ID.
pub fn generate_batch_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================
