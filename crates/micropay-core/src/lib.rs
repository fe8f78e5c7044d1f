//! # micropay-core: Pure Domain Logic for the Micropay Terminal
//!
//! Everything in this crate is deterministic and free of I/O. The ledger,
//! the device readers and the console all build on these types.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Micropay Architecture                            │
//! │                                                                         │
//! │  Card reader ──┐                                 ┌── Console (kiosk)    │
//! │  Barcode  ─────┼──► micropay-terminal ◄──────────┘                      │
//! │                │    session, gates, capture                             │
//! │                │            │                                           │
//! │                │            ▼                                           │
//! │                │    micropay-db (ledger)                                │
//! │                │            │                                           │
//! │  ┌─────────────▼────────────▼──────────────────────────────────────┐   │
//! │  │              ★ micropay-core (THIS CRATE) ★                     │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │   token   │  │   money   │  │   types   │  │ validation│   │   │
//! │  │   │ CardToken │  │   Money   │  │  Account  │  │  amounts  │   │   │
//! │  │   │ Barcode.. │  │           │  │  Product  │  │  names    │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`token`] - Card and barcode identity tokens
//! - [`money`] - Integer minor-unit money
//! - [`types`] - Ledger rows and channel identifiers
//! - [`error`] - Domain error types
//! - [`validation`] - Operator input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use micropay_core::{BarcodeToken, CardToken, Money};
//!
//! let card = CardToken::from_swipe(b";1234567890?");
//! assert_eq!(card.as_str().len(), 40);
//!
//! let code = BarcodeToken::from_scan(b"57-01234\r").unwrap();
//! assert_eq!(code.as_str(), "5701234");
//!
//! let balance = Money::from_minor(500) - Money::from_minor(150);
//! assert_eq!(balance.minor(), 350);
//! ```

pub mod error;
pub mod money;
pub mod token;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use money::Money;
pub use token::{BarcodeToken, CardToken};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of a member or product name.
pub const MAX_NAME_LEN: usize = 100;

/// Largest amount an operator may type in one entry, in minor units.
///
/// Keeps balances far away from `i64` overflow even after many top-ups.
pub const MAX_AMOUNT_MINOR: i64 = 100_000_000;
