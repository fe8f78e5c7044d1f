//! # micropay-terminal: Session & Device Arbitration for Micropay
//!
//! Decides what every card swipe and barcode scan means: a login, a
//! purchase, a price check, or a value captured by an admin flow.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Terminal Architecture                            │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ DeviceReader   │  │ DeviceReader   │  │ InactivityMonitor      │    │
//! │  │ (card)         │  │ (barcode)      │  │                        │    │
//! │  │ SHA-1 of swipe │  │ digits only    │  │ 1 s tick, logout after │    │
//! │  └───────┬────────┘  └───────┬────────┘  │ 30 s idle              │    │
//! │          │                   │           └───────────┬────────────┘    │
//! │          ▼                   ▼                       │                 │
//! │  ┌──────────────────────────────────────────────────▼──────────────┐  │
//! │  │                         Terminal                                │  │
//! │  │  card gate + capture   barcode gate + capture   session         │  │
//! │  └──────────────────────────────┬──────────────────────────────────┘  │
//! │                                 │                                      │
//! │  ┌────────────────┐             ▼                                      │
//! │  │ AdminFlows     │──►  micropay-db ledger (SQLite)                    │
//! │  │ top up, enroll │                                                    │
//! │  └────────────────┘                                                    │
//! │                                                                         │
//! │  EVENTS (to the console via TerminalEventEmitter):                     │
//! │  LoggedIn, UnknownCustomer, LoggedOut, UnknownProduct, PriceCheck,     │
//! │  Purchased, PurchaseFailed                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`terminal`] - Token routing, gates, and session control
//! - [`capture`] - Per-channel gate and one-shot capture slot
//! - [`session`] - Logged-in holder and last activity
//! - [`device`] - Framed serial readers with reopen/backoff
//! - [`monitor`] - Inactivity logout
//! - [`admin`] - Top-up and enrollment flows
//! - [`runtime`] - Starts and stops the background tasks
//! - [`config`] - TOML + environment configuration
//! - [`events`] - Events for the console
//! - [`error`] - Terminal error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use micropay_terminal::{Terminal, TerminalConfig, TerminalRuntime};
//! use micropay_db::Database;
//!
//! let config = TerminalConfig::load_or_default(None);
//! let db = Database::new(config.db_config()).await?;
//!
//! let terminal = Terminal::new(db);
//! let runtime = TerminalRuntime::start(terminal.clone(), &config);
//!
//! // ... console loop ...
//!
//! runtime.shutdown().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod admin;
pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod monitor;
pub mod runtime;
pub mod session;
pub mod terminal;

// =============================================================================
// Re-exports
// =============================================================================

pub use admin::{AdminFlows, AdminOutcome, Operator};
pub use capture::PendingCapture;
pub use config::TerminalConfig;
pub use device::{
    BarcodeSource, CardSource, DeviceReader, DeviceReaderHandle, EventSource, FrameConfig,
    ScriptedSource, SerialDevice,
};
pub use error::{TerminalError, TerminalResult};
pub use events::{ChannelEmitter, LogoutReason, NoOpEmitter, TerminalEvent, TerminalEventEmitter};
pub use monitor::{InactivityMonitor, MonitorConfig, MonitorHandle};
pub use runtime::TerminalRuntime;
pub use session::SessionSnapshot;
pub use terminal::{BarcodeOutcome, CardOutcome, Router, Terminal};
