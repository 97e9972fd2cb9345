//! Virtual device implementations: light and thermometer.
//!
//! Each virtual device has a fixed [`DeviceId`] and fixed function ids so
//! persisted actions keep matching across restarts.

mod light;
mod thermometer;

pub use light::VirtualLight;
pub use thermometer::VirtualThermometer;

use synhub_domain::device::DeviceDescriptor;
use synhub_domain::id::{DeviceId, FunctionId};
use synhub_domain::value::Value;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Thermometer(VirtualThermometer),
}

impl VirtualDevice {
    #[must_use]
    pub fn id(&self) -> DeviceId {
        match self {
            Self::Light(_) => VirtualLight::ID,
            Self::Thermometer(_) => VirtualThermometer::ID,
        }
    }

    /// Describe the device's functions for the catalog.
    #[must_use]
    pub fn descriptor(&self) -> DeviceDescriptor {
        match self {
            Self::Light(d) => d.descriptor(),
            Self::Thermometer(d) => d.descriptor(),
        }
    }

    /// Invoke a function. `None` means the call was refused; otherwise the
    /// returned values (empty for void functions).
    pub fn call(&self, function: FunctionId, args: &[Value]) -> Option<Vec<Value>> {
        match self {
            Self::Light(d) => d.call(function, args),
            Self::Thermometer(d) => d.call(function, args),
        }
    }
}
