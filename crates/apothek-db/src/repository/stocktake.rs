//! # Stocktake Repository
//!
//! Sessions and per-product count items for physical stock reconciliation.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stocktake Lifecycle                                 │
//! │                                                                         │
//! │  1. CREATE SESSION                                                     │
//! │     └── create_session() → { status: counting }                        │
//! │                                                                         │
//! │  2. COUNT (repeatable, upsert per product)                             │
//! │     └── upsert_item() → variance recomputed on every write             │
//! │                                                                         │
//! │  3. APPROVE (engine drives, one transaction per item)                  │
//! │     └── stocktake movement + mark_item_adjusted per item               │
//! │     └── approve_session() → { status: approved }                       │
//! │                                                                         │
//! │  (or) CANCEL                                                           │
//! │     └── cancel_session() → { status: cancelled }                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use apothek_core::{StocktakeItem, StocktakeSession, StocktakeStatus};

const ITEM_COLUMNS: &str = r#"
    id, session_id, product_id, system_quantity, counted_quantity,
    variance, adjusted, movement_id, counted_at
"#;

/// Repository for stocktake database operations.
#[derive(Debug, Clone)]
pub struct StocktakeRepository {
    pool: SqlitePool,
}

impl StocktakeRepository {
    /// Creates a new StocktakeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StocktakeRepository { pool }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Creates a new counting session.
    pub async fn create_session(&self, created_by: &str) -> DbResult<StocktakeSession> {
        let session = StocktakeSession {
            id: Uuid::new_v4().to_string(),
            status: StocktakeStatus::Counting,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            approved_at: None,
        };

        debug!(id = %session.id, "Creating stocktake session");

        sqlx::query(
            r#"
            INSERT INTO stocktake_sessions (id, status, created_by, created_at, approved_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&session.id)
        .bind(session.status)
        .bind(&session.created_by)
        .bind(session.created_at)
        .bind(session.approved_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    /// Gets a session by ID.
    pub async fn get_session(&self, id: &str) -> DbResult<Option<StocktakeSession>> {
        let session = sqlx::query_as::<_, StocktakeSession>(
            r#"
            SELECT id, status, created_by, created_at, approved_at
            FROM stocktake_sessions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// Transitions a session from `counting` to `approved`.
    ///
    /// Guarded on the current status, so a concurrent double-approval
    /// surfaces as a Conflict instead of silently re-approving.
    pub async fn approve_session(&self, session_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE stocktake_sessions
            SET status = 'approved', approved_at = ?2
            WHERE id = ?1 AND status = 'counting'
            "#,
        )
        .bind(session_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.status_guard_error(session_id).await?);
        }

        Ok(())
    }

    /// Transitions a session from `counting` to `cancelled`.
    pub async fn cancel_session(&self, session_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stocktake_sessions
            SET status = 'cancelled'
            WHERE id = ?1 AND status = 'counting'
            "#,
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.status_guard_error(session_id).await?);
        }

        Ok(())
    }

    /// Distinguishes "session missing" from "session in a terminal state"
    /// after a guarded transition matched no row.
    async fn status_guard_error(&self, session_id: &str) -> DbResult<DbError> {
        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stocktake_sessions WHERE id = ?1")
                .bind(session_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(if exists == 0 {
            DbError::not_found("StocktakeSession", session_id)
        } else {
            DbError::conflict("StocktakeSession", session_id)
        })
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Upserts a count for (session, product).
    ///
    /// The caller supplies the item with variance already recomputed from
    /// counted and system quantities. Re-counting an already-adjusted item
    /// is refused.
    pub async fn upsert_item(&self, item: &StocktakeItem) -> DbResult<()> {
        debug!(
            session_id = %item.session_id,
            product_id = %item.product_id,
            counted = %item.counted_quantity,
            variance = %item.variance,
            "Upserting stocktake item"
        );

        let result = sqlx::query(
            r#"
            INSERT INTO stocktake_items (
                id, session_id, product_id, system_quantity, counted_quantity,
                variance, adjusted, movement_id, counted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)
            ON CONFLICT (session_id, product_id) DO UPDATE SET
                system_quantity = excluded.system_quantity,
                counted_quantity = excluded.counted_quantity,
                variance = excluded.variance,
                counted_at = excluded.counted_at
            WHERE stocktake_items.adjusted = 0
            "#,
        )
        .bind(&item.id)
        .bind(&item.session_id)
        .bind(&item.product_id)
        .bind(item.system_quantity)
        .bind(item.counted_quantity)
        .bind(item.variance)
        .bind(item.counted_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(
                "StocktakeItem",
                format!("{}/{}", item.session_id, item.product_id),
            ));
        }

        Ok(())
    }

    /// Lists all items of a session.
    pub async fn list_items(&self, session_id: &str) -> DbResult<Vec<StocktakeItem>> {
        let items = sqlx::query_as::<_, StocktakeItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM stocktake_items
            WHERE session_id = ?1
            ORDER BY counted_at, id
            "#
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets the item for a (session, product) pair.
    ///
    /// The upsert keeps the original row id on re-count, so callers that
    /// need the stored row fetch it by the natural key.
    pub async fn get_item_for_product(
        &self,
        session_id: &str,
        product_id: &str,
    ) -> DbResult<Option<StocktakeItem>> {
        let item = sqlx::query_as::<_, StocktakeItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM stocktake_items
            WHERE session_id = ?1 AND product_id = ?2
            "#
        ))
        .bind(session_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets one item by ID.
    pub async fn get_item(&self, item_id: &str) -> DbResult<Option<StocktakeItem>> {
        let item = sqlx::query_as::<_, StocktakeItem>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM stocktake_items
            WHERE id = ?1
            "#
        ))
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(item)
    }

    /// Marks an item adjusted, linking the adjustment movement.
    ///
    /// Runs on the caller's transaction: the flag and the movement it
    /// references must land together. The `adjusted = 0` guard makes a
    /// concurrent double-approval of the same item impossible.
    pub async fn mark_item_adjusted_with(
        conn: &mut SqliteConnection,
        item_id: &str,
        movement_id: &str,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE stocktake_items
            SET adjusted = 1, movement_id = ?2
            WHERE id = ?1 AND adjusted = 0
            "#,
        )
        .bind(item_id)
        .bind(movement_id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("StocktakeItem", item_id));
        }

        Ok(())
    }
}

/// Helper to generate a new stocktake item ID.
pub fn generate_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, id: &str) {
        sqlx::query(
            r#"
            INSERT INTO products (id, sku, name, selling_price_cents, reorder_point,
                                  is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 250, 10, 1, ?4, ?4)
            "#,
        )
        .bind(id)
        .bind(format!("SKU-{}", id))
        .bind(format!("Product {}", id))
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();
    }

    fn item(session_id: &str, product_id: &str, system: i64, counted: i64) -> StocktakeItem {
        StocktakeItem {
            id: generate_item_id(),
            session_id: session_id.to_string(),
            product_id: product_id.to_string(),
            system_quantity: system,
            counted_quantity: counted,
            variance: counted - system,
            adjusted: false,
            movement_id: None,
            counted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let db = test_db().await;
        let repo = db.stocktakes();

        let session = repo.create_session("pharmacist-1").await.unwrap();
        assert_eq!(session.status, StocktakeStatus::Counting);

        repo.approve_session(&session.id).await.unwrap();
        let approved = repo.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(approved.status, StocktakeStatus::Approved);
        assert!(approved.approved_at.is_some());

        // Second approval is refused
        let err = repo.approve_session(&session.id).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_item_upsert_recounts() {
        let db = test_db().await;
        seed_product(&db, "p1").await;
        let repo = db.stocktakes();

        let session = repo.create_session("pharmacist-1").await.unwrap();

        repo.upsert_item(&item(&session.id, "p1", 10, 8)).await.unwrap();
        // Re-count the same product within the session
        repo.upsert_item(&item(&session.id, "p1", 10, 12)).await.unwrap();

        let items = repo.list_items(&session.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].counted_quantity, 12);
        assert_eq!(items[0].variance, 2);
    }

    #[tokio::test]
    async fn test_adjusted_item_is_frozen() {
        let db = test_db().await;
        seed_product(&db, "p1").await;
        let repo = db.stocktakes();

        let session = repo.create_session("pharmacist-1").await.unwrap();
        repo.upsert_item(&item(&session.id, "p1", 10, 8)).await.unwrap();
        let stored = repo.list_items(&session.id).await.unwrap()[0].clone();

        // Link a movement and freeze the item
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, movement_type, quantity,
                                         unit_cost_cents, actor_id, created_at)
            VALUES ('m1', 'p1', 'stocktake', -2, 0, 'pharmacist-1', ?1)
            "#,
        )
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            StocktakeRepository::mark_item_adjusted_with(&mut conn, &stored.id, "m1")
                .await
                .unwrap();
        }

        // Further counting is refused
        let err = repo
            .upsert_item(&item(&session.id, "p1", 10, 20))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        // Double adjustment is refused
        let mut conn = db.pool().acquire().await.unwrap();
        let err = StocktakeRepository::mark_item_adjusted_with(&mut conn, &stored.id, "m1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
    }
}
