//! # Terminal Error Types
//!
//! Everything the console can report to the operator.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      TerminalError                                      │
//! │                                                                         │
//! │  Operator-recoverable (reported, back to the menu)                     │
//! │  ├── UnknownCustomer / UnknownProduct                                  │
//! │  ├── InvalidAmount / InvalidInput                                      │
//! │  ├── DuplicateKey / NotFound                                           │
//! │  ├── NotLoggedIn                                                        │
//! │  └── CaptureAborted                                                     │
//! │                                                                         │
//! │  Programming errors                                                     │
//! │  └── CaptureAlreadyArmed                                               │
//! │                                                                         │
//! │  Infrastructure                                                         │
//! │  ├── DeviceFault   (reader retries, never fatal)                       │
//! │  ├── Database                                                           │
//! │  └── Config / Io                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use micropay_core::{Channel, ValidationError};
use micropay_db::DbError;
use thiserror::Error;

/// Result type alias for terminal operations.
pub type TerminalResult<T> = Result<T, TerminalError>;

/// Terminal error type.
#[derive(Debug, Error)]
pub enum TerminalError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Card not enrolled (or the account was removed after login).
    #[error("Unknown customer")]
    UnknownCustomer,

    /// Barcode not in the product table.
    #[error("Unknown product: {barcode}")]
    UnknownProduct { barcode: String },

    /// Row to update does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    /// Operation needs a logged-in customer.
    #[error("Not logged in. Swipe card and try again.")]
    NotLoggedIn,

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Amount is not a whole non-negative number (or zero for a top-up).
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Any other rejected operator input (name too long, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unique constraint violated; nothing was written.
    #[error("{0}")]
    DuplicateKey(String),

    // =========================================================================
    // Capture Errors
    // =========================================================================
    /// The operator abandoned a capture, or the channel was closed under it.
    #[error("Capture on {channel} channel aborted")]
    CaptureAborted { channel: Channel },

    /// A second capture was armed on a channel that already has one.
    #[error("A capture is already armed on the {channel} channel")]
    CaptureAlreadyArmed { channel: Channel },

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    /// Device open or read failed.
    #[error("Device fault on {device}: {message}")]
    DeviceFault { device: String, message: String },

    /// Ledger failure other than the categorized ones above.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration invalid or unreadable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Console I/O failed.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for TerminalError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation { field, value } => {
                TerminalError::DuplicateKey(format!("{} '{}' already exists", field, value))
            }
            DbError::NotFound { entity, id } => TerminalError::NotFound { entity, key: id },
            DbError::Validation(v) => v.into(),
            other => TerminalError::Database(other.to_string()),
        }
    }
}

impl From<ValidationError> for TerminalError {
    fn from(err: ValidationError) -> Self {
        if err.is_invalid_amount() {
            TerminalError::InvalidAmount(err.to_string())
        } else {
            TerminalError::InvalidInput(err.to_string())
        }
    }
}

impl From<std::io::Error> for TerminalError {
    fn from(err: std::io::Error) -> Self {
        TerminalError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for TerminalError {
    fn from(err: toml::de::Error) -> Self {
        TerminalError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for TerminalError {
    fn from(err: toml::ser::Error) -> Self {
        TerminalError::Config(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl TerminalError {
    /// Returns true if the operator caused this and the terminal carries on
    /// unchanged.
    pub fn is_operator_error(&self) -> bool {
        matches!(
            self,
            TerminalError::UnknownCustomer
                | TerminalError::UnknownProduct { .. }
                | TerminalError::NotFound { .. }
                | TerminalError::NotLoggedIn
                | TerminalError::InvalidAmount(_)
                | TerminalError::InvalidInput(_)
                | TerminalError::DuplicateKey(_)
                | TerminalError::CaptureAborted { .. }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(self, TerminalError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_maps_to_duplicate_key() {
        let err: TerminalError = DbError::duplicate("card", "A9993E36").into();
        assert!(matches!(err, TerminalError::DuplicateKey(_)));
        assert_eq!(err.to_string(), "card 'A9993E36' already exists");
        assert!(err.is_operator_error());
    }

    #[test]
    fn test_amount_validation_maps_to_invalid_amount() {
        let err: TerminalError = DbError::Validation(ValidationError::MustBePositive {
            field: "amount".into(),
        })
        .into();
        assert!(matches!(err, TerminalError::InvalidAmount(_)));

        let err: TerminalError = ValidationError::TooLong {
            field: "member".into(),
            max: 100,
        }
        .into();
        assert!(matches!(err, TerminalError::InvalidInput(_)));
    }

    #[test]
    fn test_infrastructure_errors_are_not_operator_errors() {
        let err: TerminalError = DbError::PoolExhausted.into();
        assert!(matches!(err, TerminalError::Database(_)));
        assert!(!err.is_operator_error());
        assert!(TerminalError::Config("x".into()).is_config_error());
    }
}
