//! # apothek-core: Pure Business Logic for Apothek POS
//!
//! This crate is the **heart** of the Apothek pharmacy POS. It contains the
//! inventory ledger rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Apothek POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  UI / API-facing layer (excluded)               │   │
//! │  │    Dispense UI ──► Receiving UI ──► Stocktake UI ──► Reports    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apothek-engine                               │   │
//! │  │    process_sale, receive_stock, approve_stocktake, alerts      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ apothek-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   fifo    │  │ valuation │  │  alerts   │  │   │
//! │  │   │  Product  │  │ Allocator │  │ cost/     │  │ low stock │  │   │
//! │  │   │  Batch    │  │ planning  │  │ retail    │  │ expiry    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apothek-db (Database Layer)                  │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockBatch, StockMovement, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`fifo`] - Expiry-ordered FIFO allocation planning
//! - [`valuation`] - Cost-basis and retail-basis inventory valuation
//! - [`alerts`] - Low-stock / expiry alert evaluation
//! - [`stocktake`] - Stocktake variance rules
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Derived State**: Stock quantity is a projection of the movement log, never
//!    a counter this crate mutates
//!
//! ## Example Usage
//!
//! ```rust
//! use apothek_core::fifo::plan_allocation;
//! use apothek_core::types::StockBatch;
//!
//! let batches: Vec<StockBatch> = vec![];
//!
//! // Requesting zero units is a no-op plan
//! let plan = plan_allocation("prod-1", &batches, 0).unwrap();
//! assert!(plan.deductions.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alerts;
pub mod error;
pub mod fifo;
pub mod money;
pub mod stocktake;
pub mod types;
pub mod validation;
pub mod valuation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use apothek_core::Money` instead of
// `use apothek_core::money::Money`

pub use error::{CoreError, ValidationError};
pub use fifo::{plan_allocation, AllocationPlan, BatchDeduction};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Rolling deduplication window for alert generation, in hours.
///
/// ## Why a constant?
/// Alert evaluation runs on page loads and periodic refreshes. Any candidate
/// matching an alert of the same (product, type, batch) created inside this
/// window is skipped, which makes `generate_and_persist` idempotent.
pub const ALERT_DEDUP_WINDOW_HOURS: i64 = 24;

/// Days-until-expiry at or below which a batch is flagged with HIGH severity.
pub const EXPIRY_HIGH_DAYS: i64 = 30;

/// Days-until-expiry at or below which a batch is flagged with MEDIUM severity.
pub const EXPIRY_MEDIUM_DAYS: i64 = 90;

/// Maximum quantity of a single line item in a sale.
///
/// ## Business Reason
/// Prevents accidental over-dispensing (e.g., typing 1000 instead of 10).
/// Configurable per-pharmacy in future versions.
pub const MAX_LINE_QUANTITY: i64 = 9999;

/// Maximum ratio of unit cost to selling price accepted at receiving time.
///
/// ## Business Reason
/// A unit cost several times the retail price almost always means the
/// pack cost was entered where the unit cost belongs. Receiving rejects
/// such entries instead of correcting them retroactively.
pub const MAX_UNIT_COST_MULTIPLIER: i64 = 10;
