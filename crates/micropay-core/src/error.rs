//! # Error Types
//!
//! Domain-specific error types for micropay-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  micropay-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Operator input failures (InvalidAmount, ...)   │
//! │                                                                         │
//! │  micropay-db errors (separate crate)                                   │
//! │  └── DbError          - Ledger operation failures                      │
//! │                                                                         │
//! │  micropay-terminal errors                                              │
//! │  └── TerminalError    - What the console reports to the operator       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → TerminalError → Console           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A scanned frame contained nothing usable.
    ///
    /// Raised for barcode frames with no digits at all. Card frames always
    /// hash, so the card reader never produces this.
    #[error("Empty {device} frame")]
    EmptyFrame { device: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Operator input validation errors.
///
/// `NotANumber`, `MustBePositive` and `OutOfRange` on an amount field are
/// what the terminal reports as an invalid amount.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Input is not a whole number.
    #[error("{field} must be a whole number, got '{input}'")]
    NotANumber { field: String, input: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },
}

impl ValidationError {
    /// Returns true if this error came from parsing a monetary amount.
    pub fn is_invalid_amount(&self) -> bool {
        matches!(
            self,
            ValidationError::NotANumber { .. }
                | ValidationError::OutOfRange { .. }
                | ValidationError::MustBePositive { .. }
        )
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
