//! # Validation Module
//!
//! Checks a formatted `Record` before it is allowed into an event.
//!
//! ## Rules
//! - `identifier` is non-empty after trimming, at most
//!   [`MAX_IDENTIFIER_LEN`](crate::MAX_IDENTIFIER_LEN) characters, and
//!   contains no control characters
//! - every phone number / email address has a non-empty `value`
//!
//! Names, organization and note are free text and never rejected.

use crate::error::ValidationError;
use crate::types::{LabeledValue, Record};
use crate::MAX_IDENTIFIER_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a record identifier.
///
/// ## Example
/// ```rust
/// use contact_core::validation::validate_identifier;
///
/// assert!(validate_identifier("410FE041-5C4E-48DA-B4DE-04C15EA3DBAC:ABPerson").is_ok());
/// assert!(validate_identifier("").is_err());
/// assert!(validate_identifier("bad\nid").is_err());
/// ```
pub fn validate_identifier(identifier: &str) -> ValidationResult<()> {
    if identifier.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "identifier".to_string(),
        });
    }

    if identifier.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: "identifier".to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if identifier.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "identifier".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(())
}

fn validate_labeled_values(field: &str, values: &[LabeledValue]) -> ValidationResult<()> {
    for (index, value) in values.iter().enumerate() {
        if value.value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: format!("{}[{}].value", field, index),
            });
        }
    }
    Ok(())
}

/// Validates a whole record.
pub fn validate_record(record: &Record) -> ValidationResult<()> {
    validate_identifier(&record.identifier)?;
    validate_labeled_values("phoneNumbers", &record.phone_numbers)?;
    validate_labeled_values("emailAddresses", &record.email_addresses)?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("abc").is_ok());
        assert!(validate_identifier("   ").is_err());
        assert!(validate_identifier(&"x".repeat(MAX_IDENTIFIER_LEN + 1)).is_err());
        assert!(validate_identifier("tab\tid").is_err());
    }

    #[test]
    fn test_validate_record() {
        let ok = Record::new("1").with_phone(None, "555-0100");
        assert!(validate_record(&ok).is_ok());

        let empty_email = Record::new("2").with_email(Some("home"), " ");
        let err = validate_record(&empty_email).unwrap_err();
        assert_eq!(err.to_string(), "emailAddresses[0].value is required");
    }
}
