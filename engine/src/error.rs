//! Error types for the Fazenda engine.

use crate::ActionId;
use thiserror::Error;

/// All possible errors from the Fazenda engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    // Queue errors
    #[error("duplicate action id: {0}")]
    DuplicateAction(ActionId),

    #[error("invalid queue data: {0}")]
    InvalidQueue(String),

    #[error("unsupported queue format version: {found} (max supported: {supported})")]
    UnsupportedFormat { found: u32, supported: u32 },

    // Input errors
    #[error("unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("invalid input for '{field}': {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::DuplicateAction("a-1".into());
        assert_eq!(err.to_string(), "duplicate action id: a-1");

        let err = Error::UnsupportedFormat {
            found: 7,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "unsupported queue format version: 7 (max supported: 1)"
        );

        let err = Error::UnknownVariant {
            kind: "aggregation rule",
            value: "mean".into(),
        };
        assert_eq!(err.to_string(), "unknown aggregation rule: mean");

        let err = Error::InvalidInput {
            field: "days",
            reason: "must be greater than zero".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid input for 'days': must be greater than zero"
        );
    }
}
