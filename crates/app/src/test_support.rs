//! In-memory fakes shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synhub_domain::device::{DeviceDescriptor, DeviceFunction, ParameterDescriptor};
use synhub_domain::id::{DeviceId, FunctionId};
use synhub_domain::validation::ValidationRule;
use synhub_domain::value::{DataType, Value};

use crate::change_bus::ChangeBus;
use crate::config::EngineConfig;
use crate::ports::{DeviceCatalog, DeviceGateway};
use crate::registry::ActionRegistry;

pub(crate) type Sent = (DeviceId, FunctionId, Vec<Value>);

/// Records every call and accepts them unless told otherwise.
#[derive(Default)]
pub(crate) struct RecordingGateway {
    pub sent: Mutex<Vec<Sent>>,
    pub refuse: AtomicBool,
    pub locked: Mutex<HashSet<DeviceId>>,
}

impl RecordingGateway {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

impl DeviceGateway for RecordingGateway {
    fn send(&self, device: DeviceId, function: FunctionId, args: &[Value]) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((device, function, args.to_vec()));
        !self.refuse.load(Ordering::SeqCst)
    }

    fn lock_device(&self, device: DeviceId, _timeout: Duration) -> bool {
        self.locked.lock().unwrap().insert(device)
    }

    fn unlock_device(&self, device: DeviceId) {
        self.locked.lock().unwrap().remove(&device);
    }
}

#[derive(Default)]
pub(crate) struct InMemoryCatalog {
    pub devices: Mutex<HashMap<DeviceId, DeviceDescriptor>>,
}

impl InMemoryCatalog {
    pub fn with(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices: Mutex::new(devices.into_iter().map(|d| (d.id, d)).collect()),
        }
    }
}

impl DeviceCatalog for InMemoryCatalog {
    fn device(&self, id: DeviceId) -> Option<DeviceDescriptor> {
        self.devices.lock().unwrap().get(&id).cloned()
    }

    fn devices(&self) -> Vec<DeviceDescriptor> {
        self.devices.lock().unwrap().values().cloned().collect()
    }
}

pub(crate) fn registry(workers: usize) -> (Arc<ActionRegistry>, Arc<RecordingGateway>, Arc<ChangeBus>) {
    let gateway = Arc::new(RecordingGateway::default());
    let bus = Arc::new(ChangeBus::new(256));
    let config = EngineConfig {
        workers,
        lock_timeout: Duration::from_millis(200),
    };
    let registry = ActionRegistry::new(config, gateway.clone(), bus.clone()).unwrap();
    (Arc::new(registry), gateway, bus)
}

pub(crate) const LAMP: DeviceId = DeviceId::from_raw(0x1a);
pub(crate) const SET_LEVEL: FunctionId = FunctionId::from_raw(1);
pub(crate) const READ_LEVEL: FunctionId = FunctionId::from_raw(2);

/// A dimmable lamp: `Set Level(Level: Byte 0..=100)` and `Read Level -> Byte`.
pub(crate) fn lamp() -> DeviceDescriptor {
    DeviceDescriptor {
        id: LAMP,
        name: "Lamp".to_string(),
        functions: vec![
            DeviceFunction {
                id: SET_LEVEL,
                name: "Set Level".to_string(),
                return_type: DataType::Void,
                parameters: vec![
                    ParameterDescriptor::new(
                        "Level",
                        DataType::Byte,
                        ValidationRule::Unsigned { min: 0, max: 100 },
                    )
                    .with_default(Value::Byte(50)),
                ],
            },
            DeviceFunction {
                id: READ_LEVEL,
                name: "Read Level".to_string(),
                return_type: DataType::Byte,
                parameters: vec![],
            },
        ],
    }
}
