//! # Domain Types
//!
//! Core domain types used throughout Apothek POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   StockBatch    │   │ StockMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │◄──│  product_id     │◄──│  product_id     │       │
//! │  │  selling_price  │   │  expiry_date    │   │  signed qty     │       │
//! │  │  reorder_point  │   │  remaining_qty  │   │  immutable      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Alert       │   │StocktakeSession │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  derived state  │   │  counting →     │   │  receipt_number │       │
//! │  │  regenerable    │   │  approved       │   │  item snapshots │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: (sku, batch_number, receipt_number) -
//!   human-readable, potentially repeated over time
//!
//! ## Derived Quantity
//! `Product` deliberately has NO stock column. The current quantity of a
//! product is always the sum of its movement quantities; the only mutable
//! derived aggregate is `StockBatch::remaining_quantity`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A pharmacy product (drug or retail item) available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name shown to pharmacist and on receipt.
    pub name: String,

    /// Therapeutic category (e.g., "Antibiotic", "Analgesic").
    pub category: Option<String>,

    /// Manufacturer name.
    pub manufacturer: Option<String>,

    /// Retail unit price in cents (smallest currency unit).
    pub selling_price_cents: i64,

    /// Quantity at or below which the product is considered low on stock.
    pub reorder_point: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }
}

// =============================================================================
// Stock Batch
// =============================================================================

/// A received lot of a product with its own expiry date and unit cost.
///
/// Batches are consumed FIFO by ascending expiry date. A batch with
/// `remaining_quantity == 0` is exhausted but retained for history.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockBatch {
    pub id: String,

    /// Owning product.
    pub product_id: String,

    /// Human batch label from the supplier. Not unique across time.
    pub batch_number: String,

    /// Last day the batch may be dispensed.
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,

    /// Acquisition cost per unit, in cents.
    pub unit_cost_cents: i64,

    /// Units still on the shelf from this batch.
    ///
    /// Invariant: `>= 0`. Monotonically non-increasing except on stocktake
    /// upward adjustment or compensating rollback.
    pub remaining_quantity: i64,

    /// Units originally received.
    pub initial_quantity: i64,

    /// Supplier the batch was received from.
    pub supplier: Option<String>,

    /// When the batch was received.
    #[ts(as = "String")]
    pub received_at: DateTime<Utc>,
}

impl StockBatch {
    /// Returns the unit cost as a Money type.
    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents)
    }

    /// A batch is expired strictly before `today`; a batch expiring today
    /// is still dispensable.
    #[inline]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }

    /// Signed number of days until expiry (negative once expired).
    #[inline]
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    /// Whether the batch has been fully consumed.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.remaining_quantity <= 0
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// The kind of ledger event a movement records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Stock received from a supplier (positive quantity).
    Purchase,
    /// Stock dispensed to a customer (negative quantity).
    Sale,
    /// Manual correction, including sale rollback restitution.
    Adjustment,
    /// Corrective movement produced by stocktake approval.
    Stocktake,
    /// Customer return (positive quantity).
    Return,
}

/// An immutable, signed quantity change against a product.
///
/// ## The Ledger Contract
/// The current quantity of a product is **defined** as the sum of its
/// movement quantities. Movements are never updated or deleted; corrections
/// are new movements. The sum is order-independent, so concurrent appends
/// need no global ordering.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,

    pub product_id: String,

    /// Batch the movement touched, when batch-attributable.
    pub batch_id: Option<String>,

    pub movement_type: MovementType,

    /// Signed quantity: positive = stock in, negative = stock out.
    pub quantity: i64,

    /// Unit cost at the time of the movement, in cents.
    pub unit_cost_cents: i64,

    /// Selling price for sale movements, in cents.
    pub selling_price_cents: Option<i64>,

    /// Free-text reason (e.g., "damaged", "sale_rollback").
    pub reason: Option<String>,

    /// Cross-reference: sale id or stocktake session id.
    pub reference: Option<String>,

    /// User who caused the movement.
    pub actor_id: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockMovement {
    /// Whether the movement adds stock.
    #[inline]
    pub fn is_inbound(&self) -> bool {
        self.quantity > 0
    }

    /// Whether the movement removes stock.
    #[inline]
    pub fn is_outbound(&self) -> bool {
        self.quantity < 0
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// The condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    ExpiringSoon,
    Expired,
}

/// How urgently an alert needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// A persisted inventory alert.
///
/// Alerts are derived, not canonical: they can be regenerated at any time
/// from product, batch and ledger state. Deduplication happens at
/// generation time, inside a rolling 24-hour window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Alert {
    pub id: String,
    pub product_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    /// Batch that triggered an expiry alert, when applicable.
    pub batch_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    pub is_read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// An alert the evaluator wants to exist.
///
/// Candidates are pure values; the engine decides whether each one
/// survives deduplication and becomes an [`Alert`] row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AlertCandidate {
    pub product_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub batch_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
}

// =============================================================================
// Stocktake
// =============================================================================

/// Lifecycle state of a stocktake session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StocktakeStatus {
    /// Items may be freely counted and re-counted.
    Counting,
    /// Adjustments have been emitted. Terminal.
    Approved,
    /// Abandoned without adjustments. Terminal.
    Cancelled,
}

impl Default for StocktakeStatus {
    fn default() -> Self {
        StocktakeStatus::Counting
    }
}

/// A physical count reconciliation session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StocktakeSession {
    pub id: String,
    pub status: StocktakeStatus,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// One counted product within a stocktake session.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StocktakeItem {
    pub id: String,
    pub session_id: String,
    pub product_id: String,

    /// Ledger quantity captured when the count was recorded.
    pub system_quantity: i64,

    /// Physically counted quantity.
    pub counted_quantity: i64,

    /// `counted_quantity - system_quantity`. Recomputed at write time,
    /// never trusted from caller input.
    pub variance: i64,

    /// Whether an adjustment movement has been emitted for this item.
    pub adjusted: bool,

    /// The adjustment movement, once `adjusted` is true. Its quantity
    /// equals `variance`.
    pub movement_id: Option<String>,

    #[ts(as = "String")]
    pub counted_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// How the customer paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Mobile wallet payment.
    MobileWallet,
}

/// A completed sale transaction.
///
/// A sale row exists only once every movement and batch decrement for it
/// has committed; a failed sale leaves no sale row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub payment_method: PaymentMethod,
    pub total_cents: i64,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Quantity sold.
    pub quantity: i64,
    /// Line total (unit_price × quantity).
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(expiry: NaiveDate) -> StockBatch {
        StockBatch {
            id: "b1".to_string(),
            product_id: "p1".to_string(),
            batch_number: "LOT-1".to_string(),
            expiry_date: expiry,
            unit_cost_cents: 100,
            remaining_quantity: 10,
            initial_quantity: 10,
            supplier: None,
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_batch_expiry_boundary() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();

        // Expiring today is NOT expired
        let b = batch(today);
        assert!(!b.is_expired(today));
        assert_eq!(b.days_until_expiry(today), 0);

        // Yesterday is expired
        let b = batch(today.pred_opt().unwrap());
        assert!(b.is_expired(today));
        assert_eq!(b.days_until_expiry(today), -1);
    }

    #[test]
    fn test_movement_direction() {
        let mut m = StockMovement {
            id: "m1".to_string(),
            product_id: "p1".to_string(),
            batch_id: None,
            movement_type: MovementType::Purchase,
            quantity: 5,
            unit_cost_cents: 100,
            selling_price_cents: None,
            reason: None,
            reference: None,
            actor_id: "u1".to_string(),
            created_at: Utc::now(),
        };
        assert!(m.is_inbound());

        m.quantity = -5;
        assert!(m.is_outbound());
    }

    #[test]
    fn test_stocktake_status_default() {
        assert_eq!(StocktakeStatus::default(), StocktakeStatus::Counting);
    }
}
