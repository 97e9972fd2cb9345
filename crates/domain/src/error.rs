//! Common error types used across the workspace.
//!
//! Each concern has its own typed error; [`SynhubError`] aggregates them via
//! `#[from]` so callers can propagate with `?`.

use crate::value::DataType;

/// Top-level error for the synhub workspace.
#[derive(Debug, thiserror::Error)]
pub enum SynhubError {
    #[error("identity error")]
    Identity(#[from] IdentityError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("structural error")]
    Structural(#[from] StructuralError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors about identifier assignment and registration.
///
/// These are operator errors: they are logged and the operation no-ops.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("identifier zero is reserved")]
    Zero,

    #[error("identifier {0:016x} is reserved")]
    Reserved(u64),

    #[error("identifier already assigned ({0:016x})")]
    AlreadyAssigned(u64),

    #[error("identifier {0:016x} is already registered")]
    Duplicate(u64),

    #[error("identifier {0:016x} is not registered")]
    Unknown(u64),
}

/// A value failed its datatype or validation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("expected a {expected} value")]
    TypeMismatch { expected: DataType },

    #[error("value {value} outside of {min}..={max}")]
    OutOfRange { value: i128, min: i128, max: i128 },

    #[error("value {0} is not an enumerated choice")]
    NotEnumerated(i64),

    #[error("text of {len} characters exceeds {max}")]
    TooLong { len: usize, max: usize },

    #[error("`{0}` is not an RFC 3339 date-time")]
    NotADateTime(String),

    #[error("parameter value cannot be resolved")]
    Unresolvable,

    #[error("name must not be empty")]
    EmptyName,
}

/// Data-integrity errors that indicate a corrupted document rather than a
/// runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("sub-action {0:016x} referenced by a sequence does not exist")]
    MissingSubAction(u64),

    #[error("parameter {0:016x} is dependent and cannot be written")]
    WriteToDependent(u64),

    #[error("internal parameter {0:016x} can only be written by its owner")]
    WriteToInternal(u64),

    #[error("parameter {0:016x} does not exist")]
    MissingParameter(u64),

    #[error("action {0:016x} is not a sequence")]
    NotASequence(u64),

    #[error("sequence item {index} out of range ({len} items)")]
    ItemOutOfRange { index: usize, len: usize },

    #[error("action {0:016x} cannot reference itself")]
    SelfReference(u64),
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_identity_error_into_top_level() {
        let err: SynhubError = IdentityError::Zero.into();
        assert!(matches!(err, SynhubError::Identity(IdentityError::Zero)));
    }

    #[test]
    fn should_format_not_found_error() {
        let err = NotFoundError {
            entity: "Action",
            id: "00000000000000ff".to_string(),
        };
        assert_eq!(err.to_string(), "Action 00000000000000ff not found");
    }

    #[test]
    fn should_format_identifiers_as_hex() {
        let err = StructuralError::WriteToDependent(0xab);
        assert_eq!(
            err.to_string(),
            "parameter 00000000000000ab is dependent and cannot be written"
        );
    }
}
