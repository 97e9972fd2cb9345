//! Document: the persisted object graph.
//!
//! Every object is stored flat and references the others by identifier only,
//! so a document can be constructed in any order and registered afterwards.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::event::Event;
use crate::parameter::ActionParameter;
use crate::trigger::Trigger;

/// Everything needed to restore the engine's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub parameters: Vec<ActionParameter>,
    #[serde(default)]
    pub events: Vec<Event>,
    /// Triggers shown outside any event (generated and user date-time ones).
    #[serde(default)]
    pub screen_triggers: Vec<Trigger>,
}

impl Document {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
            && self.parameters.is_empty()
            && self.events.is_empty()
            && self.screen_triggers.is_empty()
    }
}
