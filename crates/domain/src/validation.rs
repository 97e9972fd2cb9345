//! Validation rules attached to parameters.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::value::{DataType, Value};

/// One named choice of an [`ValidationRule::Enumerated`] rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    pub name: String,
    pub value: u64,
}

impl EnumEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, value: u64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Constraint a parameter value must satisfy on top of its datatype.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidationRule {
    /// Any value of the datatype.
    #[default]
    FullRange,
    /// Unsigned interpretation must fall within `min..=max`.
    Unsigned { min: u64, max: u64 },
    /// Two's-complement interpretation must fall within `min..=max`.
    Signed { min: i64, max: i64 },
    /// Value must be one of the listed choices.
    Enumerated { entries: Vec<EnumEntry> },
    /// Text must not exceed `max` characters.
    MaxLength { max: usize },
    /// Value must be a boolean.
    Boolean,
    /// Text must be an RFC 3339 date-time.
    DateTime,
}

impl ValidationRule {
    /// Check `value` against this rule for a parameter of `data_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] if the value does not carry
    /// `data_type`, or the rule-specific error when the value is rejected.
    pub fn check(&self, data_type: DataType, value: &Value) -> Result<(), ValidationError> {
        if value.data_type() != data_type {
            return Err(ValidationError::TypeMismatch {
                expected: data_type,
            });
        }
        match self {
            Self::FullRange => Ok(()),
            Self::Unsigned { min, max } => {
                let v = value.as_unsigned().ok_or(ValidationError::TypeMismatch {
                    expected: data_type,
                })?;
                if v < *min || v > *max {
                    return Err(ValidationError::OutOfRange {
                        value: i128::from(v),
                        min: i128::from(*min),
                        max: i128::from(*max),
                    });
                }
                Ok(())
            }
            Self::Signed { min, max } => {
                let v = value.as_signed().ok_or(ValidationError::TypeMismatch {
                    expected: data_type,
                })?;
                if v < *min || v > *max {
                    return Err(ValidationError::OutOfRange {
                        value: i128::from(v),
                        min: i128::from(*min),
                        max: i128::from(*max),
                    });
                }
                Ok(())
            }
            Self::Enumerated { entries } => {
                let v = value.as_unsigned().ok_or(ValidationError::TypeMismatch {
                    expected: data_type,
                })?;
                if entries.iter().any(|e| e.value == v) {
                    Ok(())
                } else {
                    Err(ValidationError::NotEnumerated(
                        i64::try_from(v).unwrap_or(i64::MAX),
                    ))
                }
            }
            Self::MaxLength { max } => match value {
                Value::Text(text) => {
                    let len = text.chars().count();
                    if len > *max {
                        Err(ValidationError::TooLong { len, max: *max })
                    } else {
                        Ok(())
                    }
                }
                _ => Err(ValidationError::TypeMismatch {
                    expected: DataType::String,
                }),
            },
            Self::Boolean => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(ValidationError::TypeMismatch {
                    expected: DataType::Bool,
                }),
            },
            Self::DateTime => match value {
                Value::Text(text) => chrono::DateTime::parse_from_rfc3339(text)
                    .map(|_| ())
                    .map_err(|_| ValidationError::NotADateTime(text.clone())),
                _ => Err(ValidationError::TypeMismatch {
                    expected: DataType::String,
                }),
            },
        }
    }

    /// Display name of an enumerated value, if this rule enumerates it.
    #[must_use]
    pub fn enum_name(&self, value: &Value) -> Option<&str> {
        let Self::Enumerated { entries } = self else {
            return None;
        };
        let raw = value.as_unsigned()?;
        entries
            .iter()
            .find(|e| e.value == raw)
            .map(|e| e.name.as_str())
    }
}
