//! # apothek-db: Database Layer for Apothek POS
//!
//! This crate provides database access for the Apothek pharmacy POS.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Apothek POS Data Flow                             │
//! │                                                                         │
//! │  Engine operation (process_sale, receive_stock, ...)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apothek-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (movement.rs, │    │  (embedded)  │  │   │
//! │  │   │               │    │  batch.rs...) │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Ledger reads  │    │ 001_init.sql │  │   │
//! │  │   │ Management    │    │ CAS updates   │    │ ...          │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                       SQLite Database (WAL)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (movement ledger, batches, ...)
//!
//! ## The Two Writing Rules
//!
//! 1. `stock_movements` is append-only: INSERT, never UPDATE/DELETE
//! 2. `stock_batches.remaining_quantity` only changes through conditional
//!    updates guarded on the current value

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::alert::AlertRepository;
pub use repository::batch::BatchRepository;
pub use repository::movement::MovementRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::stocktake::StocktakeRepository;
