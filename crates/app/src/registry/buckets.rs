//! Listing buckets: where an action shows up, chosen once from its kind.

use std::collections::HashMap;

use synhub_domain::action::{Action, ActionBody};
use synhub_domain::id::{ActionId, DeviceId};

#[derive(Debug, Default)]
pub(crate) struct Buckets {
    user: Vec<ActionId>,
    system: Vec<ActionId>,
    devices: HashMap<DeviceId, Vec<ActionId>>,
}

impl Buckets {
    fn slot(&mut self, action: &Action) -> Option<&mut Vec<ActionId>> {
        match &action.body {
            ActionBody::Device { device, .. } => Some(self.devices.entry(*device).or_default()),
            ActionBody::Delay => Some(&mut self.system),
            ActionBody::Sequence { .. } => Some(&mut self.user),
            // owned by their event, tracked only in the by-id table
            ActionBody::Event { .. } => None,
        }
    }

    /// Returns whether the action went into a bucket.
    pub(crate) fn place(&mut self, action: &Action) -> bool {
        let id = action.id();
        match self.slot(action) {
            Some(slot) if !slot.contains(&id) => {
                slot.push(id);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove(&mut self, action: &Action) {
        let id = action.id();
        if let Some(slot) = self.slot(action) {
            slot.retain(|a| *a != id);
        }
        if let ActionBody::Device { device, .. } = &action.body
            && self.devices.get(device).is_some_and(Vec::is_empty)
        {
            self.devices.remove(device);
        }
    }

    pub(crate) fn user(&self) -> &[ActionId] {
        &self.user
    }

    pub(crate) fn system(&self) -> &[ActionId] {
        &self.system
    }

    pub(crate) fn device(&self, device: DeviceId) -> &[ActionId] {
        self.devices.get(&device).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synhub_domain::id::FunctionId;

    fn action(raw: u64, body: ActionBody) -> Action {
        let mut action = Action::new(format!("a{raw}"), body);
        action.assign_id(ActionId::from_raw(raw)).unwrap();
        action
    }

    #[test]
    fn should_place_by_kind() {
        let mut buckets = Buckets::default();
        let device = action(
            1,
            ActionBody::Device {
                device: DeviceId::from_raw(7),
                function: FunctionId::from_raw(1),
            },
        );
        let delay = action(2, ActionBody::Delay);
        let sequence = action(3, ActionBody::Sequence { items: vec![] });
        let binding = action(
            4,
            ActionBody::Event {
                target: ActionId::from_raw(3),
                conditionals: vec![],
            },
        );
        assert!(buckets.place(&device));
        assert!(buckets.place(&delay));
        assert!(buckets.place(&sequence));
        assert!(!buckets.place(&binding));

        assert_eq!(buckets.device(DeviceId::from_raw(7)), &[ActionId::from_raw(1)]);
        assert_eq!(buckets.system(), &[ActionId::from_raw(2)]);
        assert_eq!(buckets.user(), &[ActionId::from_raw(3)]);
    }

    #[test]
    fn should_not_place_twice() {
        let mut buckets = Buckets::default();
        let delay = action(2, ActionBody::Delay);
        assert!(buckets.place(&delay));
        assert!(!buckets.place(&delay));
        assert_eq!(buckets.system().len(), 1);
    }

    #[test]
    fn should_forget_device_when_its_last_action_is_removed() {
        let mut buckets = Buckets::default();
        let device = action(
            1,
            ActionBody::Device {
                device: DeviceId::from_raw(7),
                function: FunctionId::from_raw(1),
            },
        );
        buckets.place(&device);
        buckets.remove(&device);
        assert!(buckets.device(DeviceId::from_raw(7)).is_empty());
        assert!(buckets.devices.is_empty());
    }
}
