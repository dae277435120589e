//! # apothek-engine: Inventory Ledger & FIFO Costing Engine
//!
//! This crate is the operational surface of Apothek POS: it composes the
//! pure rules in `apothek-core` with the SQLite storage in `apothek-db`
//! into the operations the (excluded) UI layer calls.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Engine Surface                                  │
//! │                                                                         │
//! │  get_current_stock(product)  → ledger quantity + batch snapshot        │
//! │  receive_stock(request)      → new batch + purchase movement           │
//! │  process_sale(lines, ...)    → FIFO allocation, commit, compensation   │
//! │  record_adjustment(...)      → manual corrective movement              │
//! │  start/record/approve/cancel stocktake                                 │
//! │  refresh_alerts(product|all) → evaluate + dedup + persist              │
//! │  inventory_valuation()       → retail + cost bases per product         │
//! │                                                                         │
//! │  Reads flow one way:   ledger + batches → allocator/valuation/alerts   │
//! │  Writes converge:      sale saga and stocktake both append movements   │
//! │                        and mutate batch remaining quantity             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//! Every operation is async and every read is a snapshot that may be stale
//! by the time a write lands. The single serialized mutation is the batch
//! remaining-quantity decrement (a conditional UPDATE in apothek-db);
//! everything else is either append-only or read-mostly.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alerts;
pub mod error;
pub mod sale;
pub mod stock;
pub mod stocktake;
pub mod valuation;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{BatchRestitution, EngineError, EngineResult, SaleAbortCause, SaleError};
pub use sale::{SaleLine, SaleReceipt};
pub use stock::{CurrentStock, ReceiveStockRequest};
pub use stocktake::{StocktakeApproval, StocktakeItemError};

pub use apothek_db::{Database, DbConfig};

use tracing::info;

// =============================================================================
// Engine
// =============================================================================

/// The inventory engine: one handle, all operations.
///
/// Cloning is cheap (shared connection pool underneath).
///
/// ## Usage
/// ```rust,ignore
/// let engine = Engine::new(DbConfig::new("./apothek.db")).await?;
///
/// let stock = engine.get_current_stock("product-id").await?;
/// let receipt = engine
///     .process_sale(&lines, PaymentMethod::Cash, "cashier-1")
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
}

impl Engine {
    /// Opens the database (running migrations) and builds an engine.
    pub async fn new(config: DbConfig) -> EngineResult<Self> {
        let db = Database::new(config).await?;
        info!("Inventory engine ready");
        Ok(Engine { db })
    }

    /// Builds an engine over an existing database handle.
    pub fn with_database(db: Database) -> Self {
        Engine { db }
    }

    /// Access to the underlying database handle.
    ///
    /// For the surrounding application's own queries (product management
    /// screens, movement history); engine invariants only hold if callers
    /// respect the append-only ledger and conditional batch updates.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
