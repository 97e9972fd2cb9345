//! Action item: one step of a sequence.

use serde::{Deserialize, Serialize};

use crate::id::{ActionId, ParamId};

/// A referenced action paired with this usage's own parameter bindings.
///
/// The parameter list is a copy of the referenced action's exposed
/// parameters, never an alias, so each usage of a shared action carries its
/// own constant and dependent bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub action: ActionId,
    pub parameters: Vec<ParamId>,
    /// The sequence privately owns `action` (an anonymous delay) and removes
    /// it together with the item.
    #[serde(default)]
    pub owned: bool,
}
