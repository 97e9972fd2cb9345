//! Trigger: a latch-style detector of an external condition.
//!
//! A trigger's `fired` latch is set by its own evaluation logic and cleared
//! only by [`Trigger::reset`]. Triggers react to messages and status changes
//! only while subscribed; events subscribe the triggers they own while they
//! are enabled.

mod schedule;

pub use schedule::{DateTimeSchedule, Repeat};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceMessage, LinkStatus, StatusChange};
use crate::error::IdentityError;
use crate::id::{DeviceId, FunctionId, ParamId, TriggerId};
use crate::time::Timestamp;

/// What a trigger observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerKind {
    /// A device function returned; parameters receive the returned values.
    Message {
        device: DeviceId,
        function: FunctionId,
    },
    /// A point in time or a recurrence.
    DateTime(DateTimeSchedule),
    /// A device (or the network when `device` is `None`) went up or down.
    Status {
        device: Option<DeviceId>,
        expect: LinkStatus,
    },
}

/// A latch over an external condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    id: TriggerId,
    pub name: String,
    #[serde(skip)]
    fired: bool,
    #[serde(skip)]
    subscribed: bool,
    /// Read-only views of what the trigger measured, in stable order.
    #[serde(default)]
    pub parameters: Vec<ParamId>,
    pub kind: TriggerKind,
    /// Generated from the device catalog rather than created by a user.
    #[serde(default)]
    pub generated: bool,
}

impl Trigger {
    /// Create a trigger without identity. The scheduler assigns one.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TriggerKind) -> Self {
        Self {
            id: TriggerId::from_raw(0),
            name: name.into(),
            fired: false,
            subscribed: false,
            parameters: Vec::new(),
            kind,
            generated: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// Assign the identifier once.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Zero`] for the zero id and
    /// [`IdentityError::AlreadyAssigned`] if an id was set before.
    pub fn assign_id(&mut self, id: TriggerId) -> Result<(), IdentityError> {
        if id.is_zero() {
            return Err(IdentityError::Zero);
        }
        if !self.id.is_zero() {
            return Err(IdentityError::AlreadyAssigned(self.id.as_raw()));
        }
        self.id = id;
        Ok(())
    }

    #[must_use]
    pub fn did_fire(&self) -> bool {
        self.fired
    }

    pub fn fire(&mut self) {
        self.fired = true;
    }

    pub fn reset(&mut self) {
        self.fired = false;
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn subscribe(&mut self) {
        self.subscribed = true;
    }

    pub fn unsubscribe(&mut self) {
        self.subscribed = false;
    }

    /// The device this trigger watches, if any.
    #[must_use]
    pub fn device(&self) -> Option<DeviceId> {
        match &self.kind {
            TriggerKind::Message { device, .. } => Some(*device),
            TriggerKind::Status { device, .. } => *device,
            TriggerKind::DateTime(_) => None,
        }
    }

    #[must_use]
    pub fn is_date_time(&self) -> bool {
        matches!(self.kind, TriggerKind::DateTime(_))
    }

    /// Latch if subscribed and `message` is the watched function's return.
    ///
    /// Returns whether the message matched; the caller then stores
    /// `message.values` into [`Self::parameters`] by position.
    pub fn observe_message(&mut self, message: &DeviceMessage) -> bool {
        if !self.watches_message(message) {
            return false;
        }
        self.fired = true;
        true
    }

    /// Whether [`observe_message`](Self::observe_message) would latch on
    /// `message`.
    #[must_use]
    pub fn watches_message(&self, message: &DeviceMessage) -> bool {
        self.subscribed
            && matches!(
                &self.kind,
                TriggerKind::Message { device, function }
                    if *device == message.device && *function == message.function
            )
    }

    /// Latch if subscribed and `change` is the watched transition.
    pub fn observe_status(&mut self, change: &StatusChange) -> bool {
        if !self.subscribed {
            return false;
        }
        let TriggerKind::Status { device, expect } = &self.kind else {
            return false;
        };
        if *device != change.device || *expect != change.status {
            return false;
        }
        self.fired = true;
        true
    }

    /// Evaluate a date-time trigger against `now`; latches on a due occurrence.
    pub fn evaluate_time(&mut self, now: Timestamp) -> bool {
        let TriggerKind::DateTime(schedule) = &mut self.kind else {
            return false;
        };
        if schedule.evaluate(now) {
            self.fired = true;
            return true;
        }
        false
    }

    /// An unregistered copy: same name and kind, no identity, no parameters,
    /// latch cleared, not subscribed. The caller gives it fresh parameter ids.
    #[must_use]
    pub fn copy_unregistered(&self) -> Self {
        Self::new(self.name.clone(), self.kind.clone())
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TriggerKind::Message { device, function } => {
                write!(f, "message({}, {device}/{function})", self.name)
            }
            TriggerKind::DateTime(schedule) => {
                write!(f, "date_time({}, {})", self.name, schedule.start)
            }
            TriggerKind::Status { device, expect } => match device {
                Some(device) => write!(f, "status({}, {device} {expect})", self.name),
                None => write!(f, "status({}, network {expect})", self.name),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn message_trigger() -> Trigger {
        let mut t = Trigger::new(
            "Switch pressed",
            TriggerKind::Message {
                device: DeviceId::from_raw(1),
                function: FunctionId::from_raw(2),
            },
        );
        t.subscribe();
        t
    }

    fn message(device: u64, function: u64) -> DeviceMessage {
        DeviceMessage {
            device: DeviceId::from_raw(device),
            function: FunctionId::from_raw(function),
            values: vec![Value::Bool(true)],
        }
    }

    #[test]
    fn should_latch_until_reset() {
        let mut t = message_trigger();
        assert!(t.observe_message(&message(1, 2)));
        assert!(t.did_fire());
        assert!(!t.observe_message(&message(1, 3)));
        assert!(t.did_fire());
        t.reset();
        assert!(!t.did_fire());
    }

    #[test]
    fn should_report_watched_message_without_latching() {
        let mut t = message_trigger();
        assert!(t.watches_message(&message(1, 2)));
        assert!(!t.watches_message(&message(2, 2)));
        assert!(!t.did_fire());
        t.unsubscribe();
        assert!(!t.watches_message(&message(1, 2)));
    }

    #[test]
    fn should_ignore_messages_while_unsubscribed() {
        let mut t = message_trigger();
        t.unsubscribe();
        assert!(!t.observe_message(&message(1, 2)));
        assert!(!t.did_fire());
    }

    #[test]
    fn should_match_status_of_watched_device_only() {
        let mut t = Trigger::new(
            "Lamp offline",
            TriggerKind::Status {
                device: Some(DeviceId::from_raw(4)),
                expect: LinkStatus::Down,
            },
        );
        t.subscribe();
        let up = StatusChange {
            device: Some(DeviceId::from_raw(4)),
            status: LinkStatus::Up,
        };
        let network_down = StatusChange {
            device: None,
            status: LinkStatus::Down,
        };
        let down = StatusChange {
            device: Some(DeviceId::from_raw(4)),
            status: LinkStatus::Down,
        };
        assert!(!t.observe_status(&up));
        assert!(!t.observe_status(&network_down));
        assert!(t.observe_status(&down));
    }

    #[test]
    fn should_fire_date_time_trigger_when_due() {
        let start: Timestamp = "2026-06-01T07:00:00Z".parse().unwrap();
        let mut t = Trigger::new(
            "Wake up",
            TriggerKind::DateTime(DateTimeSchedule::once(start)),
        );
        assert!(!t.evaluate_time("2026-06-01T06:59:00Z".parse().unwrap()));
        assert!(t.evaluate_time(start));
        assert!(t.did_fire());
    }

    #[test]
    fn should_copy_without_identity_or_latch() {
        let mut t = message_trigger();
        t.assign_id(TriggerId::from_raw(5)).unwrap();
        t.parameters.push(ParamId::from_raw(6));
        t.fire();
        let copy = t.copy_unregistered();
        assert!(copy.id().is_zero());
        assert!(copy.parameters.is_empty());
        assert!(!copy.did_fire());
        assert!(!copy.is_subscribed());
        assert_eq!(copy.kind, t.kind);
    }

    #[test]
    fn should_not_persist_latch_or_subscription() {
        let mut t = message_trigger();
        t.fire();
        let json = serde_json::to_string(&t).unwrap();
        let parsed: Trigger = serde_json::from_str(&json).unwrap();
        assert!(!parsed.did_fire());
        assert!(!parsed.is_subscribed());
        assert_eq!(parsed.name, t.name);
    }
}
