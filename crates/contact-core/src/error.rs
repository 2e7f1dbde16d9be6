//! # Error Types
//!
//! Domain-specific error types for contact-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  contact-core errors (this file)                                       │
//! │  ├── CoreError        - A native record could not become a Record      │
//! │  └── ValidationError  - Field-level validation failures                │
//! │                                                                         │
//! │  contact-sync errors (separate crate)                                  │
//! │  └── SyncError        - Store, emit, config and startup failures       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError::PerRecord → log+skip   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised while turning one native record into a `Record`.
///
/// Every variant is scoped to a single record: the caller skips that record
/// and keeps building the rest of the event.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The native record is unusable (unparseable, wrong shape, ...).
    #[error("Invalid record {identifier}: {reason}")]
    InvalidRecord { identifier: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Shorthand for `InvalidRecord`.
    pub fn invalid(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::InvalidRecord {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Field validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::invalid("abc-123", "not a JSON object");
        assert_eq!(err.to_string(), "Invalid record abc-123: not a JSON object");

        let err = ValidationError::Required {
            field: "identifier".to_string(),
        };
        assert_eq!(err.to_string(), "identifier is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::TooLong {
            field: "identifier".to_string(),
            max: 10,
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
