//! # synhub-adapter-virtual
//!
//! Virtual/demo devices for testing and demonstration.
//!
//! ## Provided devices
//!
//! | Device | Functions | Behaviour |
//! |--------|-----------|-----------|
//! | Virtual Light | `Set Level(Level: byte 0..=100)`, `Read Level -> byte` | Holds a dimmer level |
//! | Virtual Thermometer | `Read Temperature -> word` | Reports tenths of a degree |
//!
//! Calls to functions with a return value produce a [`DeviceMessage`] on
//! every receiver handed out by [`VirtualIntegration::subscribe`].
//!
//! ## Dependency rule
//!
//! Depends on `synhub-app` (port traits) and `synhub-domain` only.

mod devices;

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use synhub_app::ports::{DeviceCatalog, DeviceGateway};
use synhub_domain::device::{DeviceDescriptor, DeviceMessage};
use synhub_domain::id::{DeviceId, FunctionId};
use synhub_domain::value::Value;

pub use devices::{VirtualDevice, VirtualLight, VirtualThermometer};

/// Virtual integration serving a fixed set of simulated devices.
pub struct VirtualIntegration {
    devices: Vec<VirtualDevice>,
    locked: Mutex<HashSet<DeviceId>>,
    unlocked: Condvar,
    listeners: Mutex<Vec<Sender<DeviceMessage>>>,
}

impl Default for VirtualIntegration {
    fn default() -> Self {
        Self {
            devices: vec![
                VirtualDevice::Light(VirtualLight::default()),
                VirtualDevice::Thermometer(VirtualThermometer::default()),
            ],
            locked: Mutex::new(HashSet::new()),
            unlocked: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl VirtualIntegration {
    /// Receive the return messages of every later call.
    pub fn subscribe(&self) -> Receiver<DeviceMessage> {
        let (tx, rx) = mpsc::channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    #[must_use]
    pub fn light(&self) -> Option<&VirtualLight> {
        self.devices.iter().find_map(|d| match d {
            VirtualDevice::Light(light) => Some(light),
            VirtualDevice::Thermometer(_) => None,
        })
    }

    #[must_use]
    pub fn thermometer(&self) -> Option<&VirtualThermometer> {
        self.devices.iter().find_map(|d| match d {
            VirtualDevice::Thermometer(thermometer) => Some(thermometer),
            VirtualDevice::Light(_) => None,
        })
    }

    fn find(&self, id: DeviceId) -> Option<&VirtualDevice> {
        self.devices.iter().find(|d| d.id() == id)
    }

    fn deliver(&self, message: &DeviceMessage) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(message.clone()).is_ok());
    }
}

impl DeviceCatalog for VirtualIntegration {
    fn device(&self, id: DeviceId) -> Option<DeviceDescriptor> {
        self.find(id).map(VirtualDevice::descriptor)
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.devices.iter().map(VirtualDevice::descriptor).collect()
    }
}

impl DeviceGateway for VirtualIntegration {
    fn send(&self, device: DeviceId, function: FunctionId, args: &[Value]) -> bool {
        let Some(target) = self.find(device) else {
            tracing::warn!(%device, "call to unknown virtual device");
            return false;
        };
        let Some(values) = target.call(function, args) else {
            tracing::warn!(%device, %function, ?args, "virtual device refused call");
            return false;
        };
        tracing::debug!(%device, %function, ?args, "virtual device called");
        if !values.is_empty() {
            self.deliver(&DeviceMessage {
                device,
                function,
                values,
            });
        }
        true
    }

    fn lock_device(&self, device: DeviceId, timeout: Duration) -> bool {
        let locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut locked, result) = self
            .unlocked
            .wait_timeout_while(locked, timeout, |locked| locked.contains(&device))
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && locked.contains(&device) {
            return false;
        }
        locked.insert(device)
    }

    fn unlock_device(&self, device: DeviceId) {
        self.locked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&device);
        self.unlocked.notify_all();
    }
}
