//! # Sale Repository
//!
//! Database operations for sales and sale items.
//!
//! A sale row is only ever written AFTER every batch decrement and sale
//! movement for it has committed (the orchestrator's guarantee), so this
//! repository is deliberately thin: inserts and reads, no status machine.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use apothek_core::{Sale, SaleItem};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, receipt_number, payment_method, total_cents, cashier_id, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Inserts a sale row.
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_sale_with(&mut conn, sale).await
    }

    /// Inserts a sale row on an existing connection/transaction.
    pub async fn insert_sale_with(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (id, receipt_number, payment_method, total_cents,
                               cashier_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(sale.payment_method)
        .bind(sale.total_cents)
        .bind(&sale.cashier_id)
        .bind(sale.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Adds an item to a sale.
    ///
    /// ## Snapshot Pattern
    /// Product details (sku, name, price) are copied to the sale item.
    /// This preserves the sale history even if product details change later.
    pub async fn add_item_with(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        debug!(sale_id = %item.sale_id, product_id = %item.product_id, "Adding sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            ) VALUES (
                ?1, ?2, ?3,
                ?4, ?5, ?6,
                ?7, ?8, ?9
            )
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT
                id, sale_id, product_id,
                sku_snapshot, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

/// Generates a receipt number in format: YYYYMMDD-HHMMSS-NNNN
///
/// ## Note
/// Uniqueness comes from the sale's UUID; the receipt number is the
/// human-friendly handle printed on paper.
pub fn generate_receipt_number() -> String {
    let now = Utc::now();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let random: u16 = (nanos % 10000) as u16;
    format!("{}-{:04}", now.format("%Y%m%d-%H%M%S"), random)
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a new sale item ID.
pub fn generate_sale_item_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use apothek_core::PaymentMethod;

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

    #[tokio::test]
    async fn test_sale_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        seed_product(&db, "p1").await;
        let repo = db.sales();

        let sale = Sale {
            id: generate_sale_id(),
            receipt_number: generate_receipt_number(),
            payment_method: PaymentMethod::Cash,
            total_cents: 750,
            cashier_id: "cashier-1".to_string(),
            created_at: Utc::now(),
        };
        repo.insert_sale(&sale).await.unwrap();

        let item = SaleItem {
            id: generate_sale_item_id(),
            sale_id: sale.id.clone(),
            product_id: "p1".to_string(),
            sku_snapshot: "SKU-p1".to_string(),
            name_snapshot: "Product p1".to_string(),
            unit_price_cents: 250,
            quantity: 3,
            line_total_cents: 750,
            created_at: Utc::now(),
        };
        {
            let mut conn = db.pool().acquire().await.unwrap();
            SaleRepository::add_item_with(&mut conn, &item).await.unwrap();
        }

        let fetched = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(fetched.total_cents, 750);
        assert_eq!(fetched.payment_method, PaymentMethod::Cash);

        let items = repo.get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_total().cents(), 750);
    }
}
