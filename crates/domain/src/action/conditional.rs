//! Conditional: a guard evaluated before an event action runs.

use serde::{Deserialize, Serialize};

use crate::id::ParamId;
use crate::parameter::ParameterResolver;

/// Comparison operator of a [`Conditional`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Equal,
    Greater,
    Less,
}

impl Comparison {
    #[must_use]
    pub fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Equal => lhs == rhs,
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
        }
    }
}

/// Compares a parameter's live integer value against a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditional {
    pub parameter: ParamId,
    pub comparison: Comparison,
    pub literal: i64,
}

impl Conditional {
    /// Whether the guard passes. An unresolvable or non-numeric parameter
    /// never passes.
    pub fn passes<R: ParameterResolver + ?Sized>(&self, resolver: &R) -> bool {
        resolver
            .parameter(self.parameter)
            .and_then(|p| p.current_value(resolver))
            .and_then(|v| v.as_integer())
            .is_some_and(|v| self.comparison.holds(v, self.literal))
    }
}

impl std::fmt::Display for Conditional {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self.comparison {
            Comparison::Equal => "==",
            Comparison::Greater => ">",
            Comparison::Less => "<",
        };
        write!(f, "{} {op} {}", self.parameter, self.literal)
    }
}
