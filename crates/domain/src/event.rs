//! Event: a combination of triggers and actions with a firing mode.
//!
//! An event owns copies of its triggers and references its event actions by
//! id. It is *complete* when it has at least one trigger and one action, and
//! only complete, enabled events are ever considered for firing.

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, SynhubError, ValidationError};
use crate::id::{ActionId, EventId, TriggerId};
use crate::trigger::Trigger;

/// How an event combines the latches of its triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Every trigger must have fired.
    #[default]
    All,
    /// One fired trigger is enough.
    Any,
}

impl std::fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Triggers bound to event actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    pub name: String,
    enabled: bool,
    pub mode: TriggerMode,
    triggers: Vec<Trigger>,
    actions: Vec<ActionId>,
    #[serde(skip)]
    complete: bool,
}

impl Event {
    /// Create a builder for constructing an [`Event`].
    #[must_use]
    pub fn builder() -> EventBuilder {
        EventBuilder::default()
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Assign the identifier once.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Zero`] for the zero id and
    /// [`IdentityError::AlreadyAssigned`] if an id was set before.
    pub fn assign_id(&mut self, id: EventId) -> Result<(), IdentityError> {
        if id.is_zero() {
            return Err(IdentityError::Zero);
        }
        if !self.id.is_zero() {
            return Err(IdentityError::AlreadyAssigned(self.id.as_raw()));
        }
        self.id = id;
        Ok(())
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), SynhubError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable; owned triggers listen only while enabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.sync_subscriptions();
    }

    /// Bring every trigger's subscription in line with `enabled`.
    pub fn sync_subscriptions(&mut self) {
        for trigger in &mut self.triggers {
            if self.enabled {
                trigger.subscribe();
            } else {
                trigger.unsubscribe();
            }
        }
    }

    #[must_use]
    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn triggers_mut(&mut self) -> &mut [Trigger] {
        &mut self.triggers
    }

    #[must_use]
    pub fn trigger(&self, id: TriggerId) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.id() == id)
    }

    /// Take ownership of a trigger copy. Subscribes it if the event is enabled.
    pub fn push_trigger(&mut self, mut trigger: Trigger) {
        if self.enabled {
            trigger.subscribe();
        } else {
            trigger.unsubscribe();
        }
        self.triggers.push(trigger);
        self.refresh_completeness();
    }

    /// Remove and return a trigger.
    pub fn take_trigger(&mut self, id: TriggerId) -> Option<Trigger> {
        let index = self.triggers.iter().position(|t| t.id() == id)?;
        let mut trigger = self.triggers.remove(index);
        trigger.unsubscribe();
        self.refresh_completeness();
        Some(trigger)
    }

    #[must_use]
    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    pub fn push_action(&mut self, action: ActionId) {
        self.actions.push(action);
        self.refresh_completeness();
    }

    /// Forget an event action. Returns whether it was present.
    pub fn remove_action(&mut self, action: ActionId) -> bool {
        let before = self.actions.len();
        self.actions.retain(|a| *a != action);
        self.refresh_completeness();
        self.actions.len() != before
    }

    /// Recompute the derived completeness flag.
    pub fn refresh_completeness(&mut self) {
        self.complete = !self.triggers.is_empty() && !self.actions.is_empty();
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Whether the event should fire now.
    ///
    /// In `All` mode one unfired trigger blocks; once every trigger fired the
    /// event is ready in either mode. In `Any` mode one fired trigger suffices.
    #[must_use]
    pub fn ready_to_execute(&self) -> bool {
        if !self.complete || !self.enabled {
            return false;
        }
        if self.triggers.iter().all(Trigger::did_fire) {
            return true;
        }
        match self.mode {
            TriggerMode::All => false,
            TriggerMode::Any => self.triggers.iter().any(Trigger::did_fire),
        }
    }

    /// Clear every trigger's latch.
    pub fn reset_triggers(&mut self) {
        for trigger in &mut self.triggers {
            trigger.reset();
        }
    }
}

/// Step-by-step builder for [`Event`].
#[derive(Debug, Default)]
pub struct EventBuilder {
    id: Option<EventId>,
    name: Option<String>,
    enabled: Option<bool>,
    mode: TriggerMode,
    triggers: Vec<Trigger>,
    actions: Vec<ActionId>,
}

impl EventBuilder {
    #[must_use]
    pub fn id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: TriggerMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    #[must_use]
    pub fn action(mut self, action: ActionId) -> Self {
        self.actions.push(action);
        self
    }

    /// Consume the builder, validate, and return an [`Event`].
    ///
    /// New events are enabled unless told otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Event, SynhubError> {
        let mut event = Event {
            id: self.id.unwrap_or(EventId::from_raw(0)),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            mode: self.mode,
            triggers: self.triggers,
            actions: self.actions,
            complete: false,
        };
        event.validate()?;
        event.sync_subscriptions();
        event.refresh_completeness();
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{DeviceId, FunctionId};
    use crate::trigger::TriggerKind;

    fn trigger(raw: u64) -> Trigger {
        let mut t = Trigger::new(
            format!("t{raw}"),
            TriggerKind::Message {
                device: DeviceId::from_raw(1),
                function: FunctionId::from_raw(raw),
            },
        );
        t.assign_id(TriggerId::from_raw(raw)).unwrap();
        t
    }

    fn event(mode: TriggerMode) -> Event {
        Event::builder()
            .name("Arrive home")
            .mode(mode)
            .trigger(trigger(1))
            .trigger(trigger(2))
            .action(ActionId::from_raw(9))
            .build()
            .unwrap()
    }

    #[test]
    fn should_require_every_trigger_in_all_mode() {
        let mut e = event(TriggerMode::All);
        assert!(!e.ready_to_execute());
        e.triggers_mut()[0].fire();
        assert!(!e.ready_to_execute());
        e.triggers_mut()[1].fire();
        assert!(e.ready_to_execute());
        e.reset_triggers();
        assert!(e.triggers().iter().all(|t| !t.did_fire()));
        assert!(!e.ready_to_execute());
    }

    #[test]
    fn should_be_ready_after_one_trigger_in_any_mode() {
        let mut e = event(TriggerMode::Any);
        e.triggers_mut()[1].fire();
        assert!(e.ready_to_execute());
    }

    #[test]
    fn should_never_be_ready_while_disabled_or_incomplete() {
        let mut e = event(TriggerMode::Any);
        e.triggers_mut()[0].fire();
        e.set_enabled(false);
        assert!(!e.ready_to_execute());

        let mut lonely = Event::builder()
            .name("No actions")
            .mode(TriggerMode::Any)
            .trigger(trigger(3))
            .build()
            .unwrap();
        lonely.triggers_mut()[0].fire();
        assert!(!lonely.is_complete());
        assert!(!lonely.ready_to_execute());
    }

    #[test]
    fn should_subscribe_triggers_only_while_enabled() {
        let mut e = event(TriggerMode::All);
        assert!(e.triggers().iter().all(Trigger::is_subscribed));
        e.set_enabled(false);
        assert!(e.triggers().iter().all(|t| !t.is_subscribed()));
        e.push_trigger(trigger(4));
        assert!(!e.trigger(TriggerId::from_raw(4)).unwrap().is_subscribed());
    }

    #[test]
    fn should_recompute_completeness_on_mutation() {
        let mut e = event(TriggerMode::All);
        assert!(e.is_complete());
        assert!(e.remove_action(ActionId::from_raw(9)));
        assert!(!e.is_complete());
        e.push_action(ActionId::from_raw(10));
        assert!(e.is_complete());
        e.take_trigger(TriggerId::from_raw(1)).unwrap();
        e.take_trigger(TriggerId::from_raw(2)).unwrap();
        assert!(!e.is_complete());
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Event::builder().build();
        assert!(matches!(
            result,
            Err(SynhubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_restore_derived_state_only_when_refreshed_after_deserializing() {
        let e = event(TriggerMode::All);
        let json = serde_json::to_string(&e).unwrap();
        let mut parsed: Event = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_complete());
        parsed.refresh_completeness();
        parsed.sync_subscriptions();
        assert!(parsed.is_complete());
        assert!(parsed.triggers().iter().all(Trigger::is_subscribed));
    }
}
