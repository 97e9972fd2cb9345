//! Typed values carried by parameters.

use serde::{Deserialize, Serialize};

/// Wire datatype of a parameter, mirroring what devices report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Byte,
    Word,
    #[serde(rename = "dword")]
    DWord,
    String,
    Void,
}

impl DataType {
    /// Width in bits for integral types, `None` otherwise.
    #[must_use]
    pub fn bit_width(self) -> Option<u32> {
        match self {
            Self::Bool => Some(1),
            Self::Byte => Some(8),
            Self::Word => Some(16),
            Self::DWord => Some(32),
            Self::String | Self::Void => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Byte => f.write_str("byte"),
            Self::Word => f.write_str("word"),
            Self::DWord => f.write_str("dword"),
            Self::String => f.write_str("string"),
            Self::Void => f.write_str("void"),
        }
    }
}

/// A raw parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    #[default]
    Void,
    Bool(bool),
    Byte(u8),
    Word(u16),
    #[serde(rename = "dword")]
    DWord(u32),
    Text(String),
}

impl Value {
    /// The zero value for a datatype.
    #[must_use]
    pub fn default_for(data_type: DataType) -> Self {
        match data_type {
            DataType::Bool => Self::Bool(false),
            DataType::Byte => Self::Byte(0),
            DataType::Word => Self::Word(0),
            DataType::DWord => Self::DWord(0),
            DataType::String => Self::Text(String::new()),
            DataType::Void => Self::Void,
        }
    }

    /// Datatype this value belongs to.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Void => DataType::Void,
            Self::Bool(_) => DataType::Bool,
            Self::Byte(_) => DataType::Byte,
            Self::Word(_) => DataType::Word,
            Self::DWord(_) => DataType::DWord,
            Self::Text(_) => DataType::String,
        }
    }

    /// Unsigned integer view of numeric and boolean values.
    #[must_use]
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Self::Bool(b) => Some(u64::from(*b)),
            Self::Byte(v) => Some(u64::from(*v)),
            Self::Word(v) => Some(u64::from(*v)),
            Self::DWord(v) => Some(u64::from(*v)),
            Self::Void | Self::Text(_) => None,
        }
    }

    /// Two's-complement reinterpretation at the value's own width.
    #[must_use]
    pub fn as_signed(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Byte(v) => Some(i64::from(v.cast_signed())),
            Self::Word(v) => Some(i64::from(v.cast_signed())),
            Self::DWord(v) => Some(i64::from(v.cast_signed())),
            Self::Void | Self::Text(_) => None,
        }
    }

    /// Integer value used by conditionals; numeric values widen unsigned.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        self.as_unsigned().and_then(|v| i64::try_from(v).ok())
    }

    /// Build a numeric value of `data_type` from an unsigned integer,
    /// truncating to the type's width.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_unsigned(data_type: DataType, raw: u64) -> Self {
        match data_type {
            DataType::Bool => Self::Bool(raw != 0),
            DataType::Byte => Self::Byte(raw as u8),
            DataType::Word => Self::Word(raw as u16),
            DataType::DWord => Self::DWord(raw as u32),
            DataType::String => Self::Text(raw.to_string()),
            DataType::Void => Self::Void,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => f.write_str("void"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Word(v) => write!(f, "{v}"),
            Self::DWord(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}
