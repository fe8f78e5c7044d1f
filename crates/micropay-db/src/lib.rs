//! # micropay-db: Ledger for the Micropay Terminal
//!
//! Persistent accounts and products on SQLite, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  micropay-terminal (router, admin flows)                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  micropay-db  ◄── THIS CRATE                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  micropay-core (Account, Product, Money, tokens)                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Ledger error types
//! - [`repository`] - Account and product repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use micropay_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("micropay.db")).await?;
//! let product = db.products().find_by_barcode(&code).await?;
//! ```

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

pub use repository::account::AccountRepository;
pub use repository::product::ProductRepository;
