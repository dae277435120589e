//! # Alert Generation
//!
//! Evaluates alert conditions against live state and persists the
//! candidates that survive the 24-hour deduplication window.
//!
//! ## Idempotence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  generate_and_persist("p1")   09:00 → low_stock row written            │
//! │  generate_and_persist("p1")   09:05 → candidate matches 09:00 row      │
//! │                                       inside the window → skipped      │
//! │  generate_and_persist("p1")   next day → window passed → new row       │
//! │                                                                         │
//! │  Page loads, periodic refreshes and post-sale hooks can all call       │
//! │  this without flooding the alerts table.                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use apothek_core::{alerts as alert_rules, Alert, AlertCandidate, CoreError};
use apothek_core::ALERT_DEDUP_WINDOW_HOURS;

use crate::error::EngineResult;
use crate::Engine;

/// Page size when refreshing alerts for the whole catalogue.
const REFRESH_PAGE_SIZE: u32 = 10_000;

impl Engine {
    /// Pure evaluation of a product's alert conditions against current
    /// state. No persistence, no deduplication.
    pub async fn evaluate_alerts(&self, product_id: &str) -> EngineResult<Vec<AlertCandidate>> {
        let db = self.database();

        let product = db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

        let quantity = db.movements().current_quantity(&product.id).await?;
        let batches = db.batches().list_available(&product.id).await?;
        let today = Utc::now().date_naive();

        Ok(alert_rules::evaluate(&product, quantity, &batches, today))
    }

    /// Evaluates and persists alerts for one product, skipping candidates
    /// that duplicate an alert of the same (product, type, batch) created
    /// within the trailing 24 hours.
    ///
    /// ## Returns
    /// Number of alert rows actually written.
    pub async fn generate_and_persist(&self, product_id: &str) -> EngineResult<usize> {
        let candidates = self.evaluate_alerts(product_id).await?;
        let db = self.database();

        let now = Utc::now();
        let cutoff = now - Duration::hours(ALERT_DEDUP_WINDOW_HOURS);
        let mut written = 0;

        for candidate in candidates {
            let duplicate = db
                .alerts()
                .exists_since(
                    &candidate.product_id,
                    candidate.alert_type,
                    candidate.batch_id.as_deref(),
                    cutoff,
                )
                .await?;

            if duplicate {
                debug!(
                    product_id = %candidate.product_id,
                    alert_type = ?candidate.alert_type,
                    "Alert suppressed by dedup window"
                );
                continue;
            }

            db.alerts()
                .insert(&Alert {
                    id: Uuid::new_v4().to_string(),
                    product_id: candidate.product_id,
                    alert_type: candidate.alert_type,
                    severity: candidate.severity,
                    message: candidate.message,
                    batch_id: candidate.batch_id,
                    expiry_date: candidate.expiry_date,
                    is_read: false,
                    created_at: now,
                })
                .await?;
            written += 1;
        }

        Ok(written)
    }

    /// Refreshes alerts for one product, or for the whole active
    /// catalogue when `product_id` is None.
    ///
    /// ## Returns
    /// Total number of alert rows written.
    pub async fn refresh_alerts(&self, product_id: Option<&str>) -> EngineResult<usize> {
        match product_id {
            Some(id) => self.generate_and_persist(id).await,
            None => {
                let products = self
                    .database()
                    .products()
                    .list_active(REFRESH_PAGE_SIZE)
                    .await?;

                let mut written = 0;
                for product in products {
                    written += self.generate_and_persist(&product.id).await?;
                }

                info!(written, "Alert refresh complete");
                Ok(written)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
