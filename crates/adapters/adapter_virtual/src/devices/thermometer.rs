//! Virtual thermometer: reports a temperature in tenths of a degree.

use std::sync::{Mutex, PoisonError};

use synhub_domain::device::{DeviceDescriptor, DeviceFunction};
use synhub_domain::id::{DeviceId, FunctionId};
use synhub_domain::value::{DataType, Value};

/// A simulated thermometer. The reading only changes through
/// [`set_reading`](Self::set_reading).
pub struct VirtualThermometer {
    tenths: Mutex<u16>,
}

impl Default for VirtualThermometer {
    fn default() -> Self {
        Self {
            tenths: Mutex::new(215),
        }
    }
}

impl VirtualThermometer {
    pub const ID: DeviceId = DeviceId::from_raw(0x5648_0000_0000_1002);
    pub const READ_TEMPERATURE: FunctionId = FunctionId::from_raw(1);

    pub fn set_reading(&self, tenths: u16) {
        *self.tenths.lock().unwrap_or_else(PoisonError::into_inner) = tenths;
    }

    #[must_use]
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            id: Self::ID,
            name: "Virtual Thermometer".to_string(),
            functions: vec![DeviceFunction {
                id: Self::READ_TEMPERATURE,
                name: "Read Temperature".to_string(),
                return_type: DataType::Word,
                parameters: Vec::new(),
            }],
        }
    }

    pub fn call(&self, function: FunctionId, args: &[Value]) -> Option<Vec<Value>> {
        match (function, args) {
            (Self::READ_TEMPERATURE, []) => {
                let tenths = *self.tenths.lock().unwrap_or_else(PoisonError::into_inner);
                Some(vec![Value::Word(tenths)])
            }
            _ => None,
        }
    }
}
