//! Virtual light: a dimmer with `Set Level` and `Read Level`.

use std::sync::{Mutex, PoisonError};

use synhub_domain::device::{DeviceDescriptor, DeviceFunction, ParameterDescriptor};
use synhub_domain::id::{DeviceId, FunctionId};
use synhub_domain::validation::ValidationRule;
use synhub_domain::value::{DataType, Value};

const MAX_LEVEL: u8 = 100;

/// A simulated dimmable light.
#[derive(Default)]
pub struct VirtualLight {
    level: Mutex<u8>,
}

impl VirtualLight {
    pub const ID: DeviceId = DeviceId::from_raw(0x5648_0000_0000_1001);
    pub const SET_LEVEL: FunctionId = FunctionId::from_raw(1);
    pub const READ_LEVEL: FunctionId = FunctionId::from_raw(2);

    #[must_use]
    pub fn level(&self) -> u8 {
        *self.level.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor {
            id: Self::ID,
            name: "Virtual Light".to_string(),
            functions: vec![
                DeviceFunction {
                    id: Self::SET_LEVEL,
                    name: "Set Level".to_string(),
                    return_type: DataType::Void,
                    parameters: vec![
                        ParameterDescriptor::new(
                            "Level",
                            DataType::Byte,
                            ValidationRule::Unsigned {
                                min: 0,
                                max: u64::from(MAX_LEVEL),
                            },
                        )
                        .with_default(Value::Byte(MAX_LEVEL)),
                    ],
                },
                DeviceFunction {
                    id: Self::READ_LEVEL,
                    name: "Read Level".to_string(),
                    return_type: DataType::Byte,
                    parameters: Vec::new(),
                },
            ],
        }
    }

    pub fn call(&self, function: FunctionId, args: &[Value]) -> Option<Vec<Value>> {
        let mut level = self.level.lock().unwrap_or_else(PoisonError::into_inner);
        match (function, args) {
            (Self::SET_LEVEL, [Value::Byte(value)]) if *value <= MAX_LEVEL => {
                *level = *value;
                Some(Vec::new())
            }
            (Self::READ_LEVEL, []) => Some(vec![Value::Byte(*level)]),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_dark() {
        assert_eq!(VirtualLight::default().level(), 0);
    }

    #[test]
    fn should_set_and_read_level() {
        let light = VirtualLight::default();
        assert_eq!(light.call(VirtualLight::SET_LEVEL, &[Value::Byte(40)]), Some(vec![]));
        assert_eq!(
            light.call(VirtualLight::READ_LEVEL, &[]),
            Some(vec![Value::Byte(40)])
        );
    }

    #[test]
    fn should_refuse_level_above_maximum() {
        let light = VirtualLight::default();
        assert_eq!(light.call(VirtualLight::SET_LEVEL, &[Value::Byte(101)]), None);
        assert_eq!(light.level(), 0);
    }

    #[test]
    fn should_refuse_wrong_argument_type() {
        let light = VirtualLight::default();
        assert_eq!(light.call(VirtualLight::SET_LEVEL, &[Value::Word(10)]), None);
    }

    #[test]
    fn should_describe_both_functions() {
        let descriptor = VirtualLight::default().descriptor();
        assert_eq!(descriptor.functions.len(), 2);
        assert!(!descriptor.function(VirtualLight::SET_LEVEL).unwrap().returns_value());
        assert!(descriptor.function(VirtualLight::READ_LEVEL).unwrap().returns_value());
    }
}
