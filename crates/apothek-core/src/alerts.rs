//! # Alert Evaluation
//!
//! Pure evaluation of inventory alert conditions for a single product.
//!
//! ## Rule Priority
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               Per Product (quantity rules, one winner)                  │
//! │                                                                         │
//! │  quantity == 0            → out_of_stock  (critical)                   │
//! │  quantity <= reorder pt   → low_stock     (high when ≤ 30% of          │
//! │                                            reorder point, else medium) │
//! │                                                                         │
//! │               Per Batch (expiry rules, ordered by expiry)              │
//! │                                                                         │
//! │  expiry before today      → expired        (critical)                  │
//! │  expires within 30 days   → expiring_soon  (high)                      │
//! │  expires within 90 days   → expiring_soon  (medium)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Evaluation is a pure function of its inputs; persistence and the
//! 24-hour deduplication window live in apothek-engine. That split is what
//! makes the rules testable without a database and the generation step
//! idempotent.

use chrono::NaiveDate;

use crate::types::{AlertCandidate, AlertSeverity, AlertType, Product, StockBatch};
use crate::{EXPIRY_HIGH_DAYS, EXPIRY_MEDIUM_DAYS};

/// Evaluates all alert conditions for one product.
///
/// `current_quantity` is the ledger quantity; `batches` is a snapshot of
/// the product's batches (exhausted ones are ignored here).
pub fn evaluate(
    product: &Product,
    current_quantity: i64,
    batches: &[StockBatch],
    today: NaiveDate,
) -> Vec<AlertCandidate> {
    let mut candidates = Vec::new();

    // Quantity rules: at most one candidate per product
    if current_quantity <= 0 {
        candidates.push(AlertCandidate {
            product_id: product.id.clone(),
            alert_type: AlertType::OutOfStock,
            severity: AlertSeverity::Critical,
            message: format!("{} is out of stock", product.name),
            batch_id: None,
            expiry_date: None,
        });
    } else if current_quantity <= product.reorder_point {
        // Integer form of `quantity <= 0.3 × reorder_point`
        let severity = if current_quantity * 10 <= product.reorder_point * 3 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        candidates.push(AlertCandidate {
            product_id: product.id.clone(),
            alert_type: AlertType::LowStock,
            severity,
            message: format!(
                "{} is low on stock: {} left (reorder point {})",
                product.name, current_quantity, product.reorder_point
            ),
            batch_id: None,
            expiry_date: None,
        });
    }

    // Expiry rules: one candidate per live batch inside the warning horizon
    let mut live: Vec<&StockBatch> = batches
        .iter()
        .filter(|b| b.remaining_quantity > 0)
        .collect();
    live.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date).then(a.id.cmp(&b.id)));

    for batch in live {
        let days = batch.days_until_expiry(today);
        let candidate = if batch.is_expired(today) {
            Some((
                AlertType::Expired,
                AlertSeverity::Critical,
                format!(
                    "Batch {} of {} expired on {}",
                    batch.batch_number, product.name, batch.expiry_date
                ),
            ))
        } else if days <= EXPIRY_HIGH_DAYS {
            Some((
                AlertType::ExpiringSoon,
                AlertSeverity::High,
                format!(
                    "Batch {} of {} expires in {} days",
                    batch.batch_number, product.name, days
                ),
            ))
        } else if days <= EXPIRY_MEDIUM_DAYS {
            Some((
                AlertType::ExpiringSoon,
                AlertSeverity::Medium,
                format!(
                    "Batch {} of {} expires in {} days",
                    batch.batch_number, product.name, days
                ),
            ))
        } else {
            None
        };

        if let Some((alert_type, severity, message)) = candidate {
            candidates.push(AlertCandidate {
                product_id: product.id.clone(),
                alert_type,
                severity,
                message,
                batch_id: Some(batch.id.clone()),
                expiry_date: Some(batch.expiry_date),
            });
        }
    }

    candidates
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn product(reorder_point: i64) -> Product {
        Product {
            id: "p1".to_string(),
            sku: "PARA-500".to_string(),
            name: "Paracetamol 500mg".to_string(),
            category: Some("Analgesic".to_string()),
            manufacturer: None,
            selling_price_cents: 250,
            reorder_point,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn batch(id: &str, expiry: NaiveDate, remaining: i64) -> StockBatch {
        StockBatch {
            id: id.to_string(),
            product_id: "p1".to_string(),
            batch_number: format!("LOT-{}", id),
            expiry_date: expiry,
            unit_cost_cents: 100,
            remaining_quantity: remaining,
            initial_quantity: remaining,
            supplier: None,
            received_at: Utc::now(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
    }

    #[test]
    fn test_out_of_stock_is_critical_and_exclusive() {
        let candidates = evaluate(&product(100), 0, &[], today());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].alert_type, AlertType::OutOfStock);
        assert_eq!(candidates[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_low_stock_severity_boundaries() {
        // reorder point 100, quantity 100: low stock, medium (100 > 30)
        let candidates = evaluate(&product(100), 100, &[], today());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].alert_type, AlertType::LowStock);
        assert_eq!(candidates[0].severity, AlertSeverity::Medium);

        // quantity 25: high (25 <= 30)
        let candidates = evaluate(&product(100), 25, &[], today());
        assert_eq!(candidates[0].severity, AlertSeverity::High);

        // exactly 30% is high
        let candidates = evaluate(&product(100), 30, &[], today());
        assert_eq!(candidates[0].severity, AlertSeverity::High);

        // above the reorder point: nothing
        let candidates = evaluate(&product(100), 101, &[], today());
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_expiry_tiers() {
        let batches = vec![
            batch("a", today() - Duration::days(1), 5), // expired
            batch("b", today() + Duration::days(10), 5), // high
            batch("c", today() + Duration::days(60), 5), // medium
            batch("d", today() + Duration::days(200), 5), // no alert
        ];

        let candidates = evaluate(&product(0), 20, &batches, today());
        assert_eq!(candidates.len(), 3);

        assert_eq!(candidates[0].alert_type, AlertType::Expired);
        assert_eq!(candidates[0].severity, AlertSeverity::Critical);
        assert_eq!(candidates[0].batch_id.as_deref(), Some("a"));

        assert_eq!(candidates[1].alert_type, AlertType::ExpiringSoon);
        assert_eq!(candidates[1].severity, AlertSeverity::High);

        assert_eq!(candidates[2].alert_type, AlertType::ExpiringSoon);
        assert_eq!(candidates[2].severity, AlertSeverity::Medium);
    }

    #[test]
    fn test_expiring_today_is_high_not_expired() {
        let candidates = evaluate(&product(0), 5, &[batch("a", today(), 5)], today());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].alert_type, AlertType::ExpiringSoon);
        assert_eq!(candidates[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_exhausted_batches_raise_no_expiry_alerts() {
        let candidates = evaluate(
            &product(0),
            5,
            &[batch("a", today() - Duration::days(30), 0)],
            today(),
        );
        assert!(candidates.is_empty());
    }
}
