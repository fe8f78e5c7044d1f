//! # Validation Module
//!
//! Operator input validation for the admin flows.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Console                                                      │
//! │  └── Empty answer = abort the step                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── parse_amount / parse_positive_amount (InvalidAmount)              │
//! │  └── validate_name                                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Ledger (SQLite)                                              │
//! │  ├── Re-checks amount sign before every write                          │
//! │  └── UNIQUE constraints on hash / barcode (DuplicateKey)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use micropay_core::validation::{parse_amount, parse_positive_amount};
//!
//! assert_eq!(parse_amount("500").unwrap().minor(), 500);
//! assert!(parse_amount("5,00").is_err());
//! assert!(parse_positive_amount("0").is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT_MINOR, MAX_NAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Parsing
// =============================================================================

/// Parses a non-negative whole amount in minor units.
///
/// ## Rules
/// - Surrounding whitespace is ignored
/// - Digits only: no sign, no separators, no decimals
/// - At most `MAX_AMOUNT_MINOR`
pub fn parse_amount(input: &str) -> ValidationResult<Money> {
    let input = input.trim();

    if input.is_empty() {
        return Err(ValidationError::Required {
            field: "amount".to_string(),
        });
    }

    if !input.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::NotANumber {
            field: "amount".to_string(),
            input: input.to_string(),
        });
    }

    // All digits, so the only possible parse failure is overflow.
    let value: i64 = input.parse().map_err(|_| out_of_range("amount"))?;
    let amount = Money::from_minor(value);
    validate_non_negative("amount", amount)?;
    Ok(amount)
}

/// Parses a strictly positive whole amount (top-ups).
pub fn parse_positive_amount(input: &str) -> ValidationResult<Money> {
    let amount = parse_amount(input)?;
    validate_positive("amount", amount)?;
    Ok(amount)
}

/// Checks that an amount is within `0..=MAX_AMOUNT_MINOR`.
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() || amount.minor() > MAX_AMOUNT_MINOR {
        return Err(out_of_range(field));
    }
    Ok(())
}

/// Checks that an amount is within `1..=MAX_AMOUNT_MINOR`.
pub fn validate_positive(field: &str, amount: Money) -> ValidationResult<()> {
    validate_non_negative(field, amount)?;
    if amount.is_zero() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT_MINOR,
    }
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a member or product name and returns it trimmed.
///
/// ## Example
/// ```rust
/// use micropay_core::validation::validate_name;
///
/// assert_eq!(validate_name("member", "  Alice ").unwrap(), "Alice");
/// assert!(validate_name("member", "   ").is_err());
/// ```
pub fn validate_name(field: &str, name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("500").unwrap(), Money::from_minor(500));
        assert_eq!(parse_amount(" 0 ").unwrap(), Money::zero());

        assert!(matches!(
            parse_amount(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            parse_amount("12.50"),
            Err(ValidationError::NotANumber { .. })
        ));
        assert!(matches!(
            parse_amount("-5"),
            Err(ValidationError::NotANumber { .. })
        ));
        assert!(matches!(
            parse_amount("99999999999999999999999"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_amount("100000001"),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_parse_positive_amount() {
        assert_eq!(parse_positive_amount("1").unwrap().minor(), 1);
        let err = parse_positive_amount("0").unwrap_err();
        assert!(matches!(err, ValidationError::MustBePositive { .. }));
        assert!(err.is_invalid_amount());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative("price", Money::zero()).is_ok());
        assert!(validate_non_negative("price", Money::from_minor(-1)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("name", "Club-Mate").unwrap(), "Club-Mate");
        assert!(validate_name("name", "").is_err());
        assert!(validate_name("name", &"A".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_name("name", &"Æ".repeat(MAX_NAME_LEN)).is_ok());
    }
}
