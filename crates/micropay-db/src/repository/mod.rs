//! # Repository Module
//!
//! Ledger repositories, one per table.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Router / AdminFlows                                                   │
//! │       │                                                                 │
//! │       │  db.accounts().purchase(&holder, price)                        │
//! │       ▼                                                                 │
//! │  AccountRepository            ProductRepository                        │
//! │  ├── find_by_token            ├── find_by_barcode                      │
//! │  ├── create                   ├── create                               │
//! │  ├── purchase                 └── update                               │
//! │  └── top_up                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (one transaction per write)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod account;
pub mod product;
