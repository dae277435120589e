//! # Alert Repository
//!
//! Persistence for derived inventory alerts.
//!
//! Alert rows are disposable: the generator can recreate them from
//! product, batch and ledger state at any time. What the repository adds
//! is the deduplication window query that keeps repeated generation runs
//! from flooding the table.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use apothek_core::{Alert, AlertType};

const ALERT_COLUMNS: &str = r#"
    id, product_id, alert_type, severity, message,
    batch_id, expiry_date, is_read, created_at
"#;

/// Repository for alert database operations.
#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: SqlitePool,
}

impl AlertRepository {
    /// Creates a new AlertRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AlertRepository { pool }
    }

    /// Inserts an alert row.
    pub async fn insert(&self, alert: &Alert) -> DbResult<()> {
        debug!(
            product_id = %alert.product_id,
            alert_type = ?alert.alert_type,
            severity = ?alert.severity,
            "Inserting alert"
        );

        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, product_id, alert_type, severity, message,
                batch_id, expiry_date, is_read, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9
            )
            "#,
        )
        .bind(&alert.id)
        .bind(&alert.product_id)
        .bind(alert.alert_type)
        .bind(alert.severity)
        .bind(&alert.message)
        .bind(&alert.batch_id)
        .bind(alert.expiry_date)
        .bind(alert.is_read)
        .bind(alert.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether an alert with the same identity exists inside the dedup
    /// window.
    ///
    /// ## Identity
    /// (product, type) for quantity alerts; (product, type, batch) for
    /// expiry alerts. A NULL batch_id only matches rows with NULL batch_id.
    pub async fn exists_since(
        &self,
        product_id: &str,
        alert_type: AlertType,
        batch_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM alerts
            WHERE product_id = ?1
              AND alert_type = ?2
              AND (batch_id = ?3 OR (batch_id IS NULL AND ?3 IS NULL))
              AND created_at > ?4
            "#,
        )
        .bind(product_id)
        .bind(alert_type)
        .bind(batch_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Lists unread alerts, newest first.
    pub async fn list_unread(&self, limit: u32) -> DbResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE is_read = 0
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(alerts)
    }

    /// Lists all alerts for a product, newest first.
    pub async fn list_for_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {ALERT_COLUMNS}
            FROM alerts
            WHERE product_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(alerts)
    }

    /// Marks an alert as read.
    pub async fn mark_read(&self, alert_id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE alerts SET is_read = 1 WHERE id = ?1")
            .bind(alert_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Alert", alert_id));
        }

        Ok(())
    }
}

/// Helper to generate a new alert ID.
pub fn generate_alert_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use apothek_core::AlertSeverity;
    use chrono::Duration;

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

    fn alert(product_id: &str, alert_type: AlertType, batch_id: Option<&str>) -> Alert {
        Alert {
            id: generate_alert_id(),
            product_id: product_id.to_string(),
            alert_type,
            severity: AlertSeverity::Medium,
            message: "test alert".to_string(),
            batch_id: batch_id.map(str::to_string),
            expiry_date: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_exists_since_window() {
        let db = test_db().await;
        seed_product(&db, "p1").await;
        let repo = db.alerts();

        repo.insert(&alert("p1", AlertType::LowStock, None))
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        assert!(repo
            .exists_since("p1", AlertType::LowStock, None, cutoff)
            .await
            .unwrap());

        // Different type does not match
        assert!(!repo
            .exists_since("p1", AlertType::OutOfStock, None, cutoff)
            .await
            .unwrap());

        // A cutoff in the future excludes the row
        let future = Utc::now() + Duration::hours(1);
        assert!(!repo
            .exists_since("p1", AlertType::LowStock, None, future)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_batch_identity_matching() {
        let db = test_db().await;
        seed_product(&db, "p1").await;
        let repo = db.alerts();

        // A product-level alert must not suppress a batch-level one
        repo.insert(&alert("p1", AlertType::Expired, None))
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::hours(24);
        assert!(!repo
            .exists_since("p1", AlertType::Expired, Some("b1"), cutoff)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unread_and_mark_read() {
        let db = test_db().await;
        seed_product(&db, "p1").await;
        let repo = db.alerts();

        let a = alert("p1", AlertType::LowStock, None);
        repo.insert(&a).await.unwrap();

        assert_eq!(repo.list_unread(10).await.unwrap().len(), 1);

        repo.mark_read(&a.id).await.unwrap();
        assert!(repo.list_unread(10).await.unwrap().is_empty());
    }
}
