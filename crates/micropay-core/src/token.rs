//! # Identity Tokens
//!
//! One physical scan becomes one token.
//!
//! ```text
//! Card reader frame  ";4711...?\r" ──► SHA-1 ──► "3F2A...C9" (CardToken)
//! Barcode frame      "57-0123 4\r" ──► digits ─► "5701234"   (BarcodeToken)
//! ```
//!
//! Card data never leaves this module in clear text. The hash covers the
//! frame exactly as the reader delivered it, terminator included, so tokens
//! match the ones stored by earlier terminals.

use std::fmt;
use std::str::FromStr;

use sha1::{Digest, Sha1};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Card Token
// =============================================================================

/// Opaque customer identity: uppercase hex SHA-1 of a card swipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardToken(String);

impl CardToken {
    /// Hashes a raw swipe frame into a token.
    pub fn from_swipe(frame: &[u8]) -> Self {
        let digest = Sha1::digest(frame);
        CardToken(hex::encode_upper(digest))
    }

    /// Wraps an already-hashed token (e.g. the `hash` column of a ledger row).
    pub fn from_hash(hash: impl Into<String>) -> Self {
        CardToken(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl fmt::Display for CardToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Barcode Token
// =============================================================================

/// A product barcode, normalized to digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarcodeToken(String);

impl BarcodeToken {
    /// Normalizes a raw scanner frame.
    ///
    /// ## Errors
    /// `CoreError::EmptyFrame` when the frame holds no digits at all.
    pub fn from_scan(frame: &[u8]) -> CoreResult<Self> {
        let digits: String = frame
            .iter()
            .filter(|b| b.is_ascii_digit())
            .map(|&b| b as char)
            .collect();

        if digits.is_empty() {
            return Err(CoreError::EmptyFrame {
                device: "barcode".to_string(),
            });
        }

        Ok(BarcodeToken(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BarcodeToken {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarcodeToken::from_scan(s.as_bytes())
    }
}

impl fmt::Display for BarcodeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
