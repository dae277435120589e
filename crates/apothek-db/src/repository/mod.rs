//! # Repository Module
//!
//! Database repository implementations for Apothek POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine operation                                                      │
//! │       │                                                                 │
//! │       │  db.movements().current_quantity(product_id)                    │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  MovementRepository                                                    │
//! │  ├── current_quantity(&self, product_id)                               │
//! │  ├── insert(&self, movement)                                           │
//! │  └── list_for_product(&self, product_id, limit)                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Methods ending in `_with` take a connection instead of using the      │
//! │  pool, so the engine can compose several writes into one transaction   │
//! │  (batch decrement + sale movement must land together).                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product CRUD and search
//! - [`batch::BatchRepository`] - Batch store with conditional decrements
//! - [`movement::MovementRepository`] - Append-only movement ledger
//! - [`alert::AlertRepository`] - Alert rows and dedup window queries
//! - [`stocktake::StocktakeRepository`] - Stocktake sessions and items
//! - [`sale::SaleRepository`] - Sale and sale item records

pub mod alert;
pub mod batch;
pub mod movement;
pub mod product;
pub mod sale;
pub mod stocktake;
