//! # Domain Types
//!
//! Ledger rows and input channel identifiers.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Account      │   │    Product      │   │    Channel      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (rowid)     │   │  id (rowid)     │   │  Card           │       │
//! │  │  token_hash (U) │   │  barcode (U)    │   │  Barcode        │       │
//! │  │  member         │   │  name           │   └─────────────────┘       │
//! │  │  balance        │   │  price          │                             │
//! │  └─────────────────┘   └─────────────────┘   (U) = unique in ledger    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::money::Money;
use crate::token::{BarcodeToken, CardToken};

// =============================================================================
// Channel
// =============================================================================

/// One physical input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Magnetic card reader: logins and customer enrollment.
    Card,
    /// Barcode scanner: purchases, price checks, product enrollment.
    Barcode,
}

impl Channel {
    /// Both channels, card first.
    pub const ALL: [Channel; 2] = [Channel::Card, Channel::Barcode];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Card => write!(f, "card"),
            Channel::Barcode => write!(f, "barcode"),
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// A customer account.
///
/// The balance is re-read from the ledger on every use; it is never cached
/// in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Account {
    /// Ledger row id.
    pub id: i64,

    /// Card token hash (unique).
    pub token_hash: String,

    /// Member display name.
    pub member: String,

    /// Balance in minor units. May be negative.
    pub balance: i64,
}

impl Account {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_minor(self.balance)
    }

    pub fn token(&self) -> CardToken {
        CardToken::from_hash(self.token_hash.clone())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product that can be scanned at the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Ledger row id.
    pub id: i64,

    /// Digits-only barcode (unique).
    pub barcode: String,

    /// Display name.
    pub name: String,

    /// Price in minor units.
    pub price: i64,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price)
    }

    /// Returns true if this row was stored under the given barcode.
    pub fn has_barcode(&self, code: &BarcodeToken) -> bool {
        self.barcode == code.as_str()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
