//! Device ports: the catalog of discovered devices and the gateway that
//! talks to them.
//!
//! Discovery, decoding and the radio protocol live behind these traits; the
//! engine only sees descriptors, identifiers and typed values.

use std::sync::Arc;
use std::time::Duration;

use synhub_domain::device::DeviceDescriptor;
use synhub_domain::id::{DeviceId, FunctionId};
use synhub_domain::value::Value;

/// Read access to the devices known so far.
pub trait DeviceCatalog: Send + Sync {
    /// Descriptor of one device.
    fn device(&self, id: DeviceId) -> Option<DeviceDescriptor>;

    /// Every known device.
    fn devices(&self) -> Vec<DeviceDescriptor>;
}

/// Invokes device functions.
///
/// Device-level execution is serialized through [`lock_device`](Self::lock_device),
/// independently of any action-level locking.
pub trait DeviceGateway: Send + Sync {
    /// Invoke `function` with positional `args`. Returns whether the device
    /// accepted the call.
    fn send(&self, device: DeviceId, function: FunctionId, args: &[Value]) -> bool;

    /// Take the device's lock, waiting at most `timeout`.
    fn lock_device(&self, device: DeviceId, timeout: Duration) -> bool;

    /// Release a lock taken with [`lock_device`](Self::lock_device).
    fn unlock_device(&self, device: DeviceId);
}

impl<T: DeviceCatalog + ?Sized> DeviceCatalog for Arc<T> {
    fn device(&self, id: DeviceId) -> Option<DeviceDescriptor> {
        (**self).device(id)
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        (**self).devices()
    }
}

impl<T: DeviceGateway + ?Sized> DeviceGateway for Arc<T> {
    fn send(&self, device: DeviceId, function: FunctionId, args: &[Value]) -> bool {
        (**self).send(device, function, args)
    }

    fn lock_device(&self, device: DeviceId, timeout: Duration) -> bool {
        (**self).lock_device(device, timeout)
    }

    fn unlock_device(&self, device: DeviceId) {
        (**self).unlock_device(device);
    }
}
