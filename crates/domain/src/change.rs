//! Change notifications for the presentation layer.

use serde::{Deserialize, Serialize};

use crate::id::{ActionId, EventId, TriggerId};

/// Something observable changed in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum Change {
    ActionAdded { action: ActionId },
    ActionRemoved { action: ActionId },
    ActionRenamed { action: ActionId, name: String },
    ParametersChanged { action: ActionId },
    RunningChanged { action: ActionId, running: bool },
    /// A trigger list changed: an event's (`Some`) or the screen triggers.
    TriggersChanged { event: Option<EventId>, trigger: Option<TriggerId> },
    EventsChanged,
}

impl Change {
    /// The action this change is about, if any.
    #[must_use]
    pub fn action(&self) -> Option<ActionId> {
        match self {
            Self::ActionAdded { action }
            | Self::ActionRemoved { action }
            | Self::ActionRenamed { action, .. }
            | Self::ParametersChanged { action }
            | Self::RunningChanged { action, .. } => Some(*action),
            Self::TriggersChanged { .. } | Self::EventsChanged => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_expose_subject_action() {
        let id = ActionId::from_raw(3);
        assert_eq!(Change::ActionAdded { action: id }.action(), Some(id));
        assert_eq!(Change::EventsChanged.action(), None);
    }

    #[test]
    fn should_serialize_with_change_tag() {
        let json = serde_json::to_value(Change::EventsChanged).unwrap();
        assert_eq!(json["change"], "events_changed");
    }
}
