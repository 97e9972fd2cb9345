//! Device: the catalog view of a physical device and the messages it sends.
//!
//! Devices are discovered and decoded by an upstream collaborator; the core
//! only sees these descriptors and the decoded values.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, FunctionId};
use crate::validation::ValidationRule;
use crate::value::{DataType, Value};

/// Shape of one argument of a device function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub validation: ValidationRule,
    /// Initial value for generated action parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType, validation: ValidationRule) -> Self {
        Self {
            name: name.into(),
            data_type,
            validation,
            default: None,
        }
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A remotely invokable function exposed by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFunction {
    pub id: FunctionId,
    pub name: String,
    pub return_type: DataType,
    /// Ordered argument list.
    pub parameters: Vec<ParameterDescriptor>,
}

impl DeviceFunction {
    /// Whether calls to this function produce a value worth triggering on.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.return_type != DataType::Void
    }
}

/// A discovered device and its stable function list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    pub functions: Vec<DeviceFunction>,
}

impl DeviceDescriptor {
    #[must_use]
    pub fn function(&self, id: FunctionId) -> Option<&DeviceFunction> {
        self.functions.iter().find(|f| f.id == id)
    }
}

/// Decoded return of a device function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub device: DeviceId,
    pub function: FunctionId,
    pub values: Vec<Value>,
}

/// Reachability of a device or of the whole network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Up,
    Down,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// A device (or, with `device == None`, the network) changed reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub device: Option<DeviceId>,
    pub status: LinkStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thermometer() -> DeviceDescriptor {
        DeviceDescriptor {
            id: DeviceId::from_raw(1),
            name: "Thermometer".to_string(),
            functions: vec![
                DeviceFunction {
                    id: FunctionId::from_raw(1),
                    name: "Read".to_string(),
                    return_type: DataType::Word,
                    parameters: vec![],
                },
                DeviceFunction {
                    id: FunctionId::from_raw(2),
                    name: "Calibrate".to_string(),
                    return_type: DataType::Void,
                    parameters: vec![ParameterDescriptor::new(
                        "Offset",
                        DataType::Byte,
                        ValidationRule::Signed { min: -10, max: 10 },
                    )],
                },
            ],
        }
    }

    #[test]
    fn should_find_function_by_id() {
        let device = thermometer();
        assert_eq!(
            device.function(FunctionId::from_raw(2)).map(|f| f.name.as_str()),
            Some("Calibrate")
        );
        assert!(device.function(FunctionId::from_raw(3)).is_none());
    }

    #[test]
    fn should_report_only_non_void_functions_as_returning_values() {
        let device = thermometer();
        let returning: Vec<_> = device
            .functions
            .iter()
            .filter(|f| f.returns_value())
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(returning, vec!["Read"]);
    }

    #[test]
    fn should_display_link_status_lowercase() {
        assert_eq!(LinkStatus::Up.to_string(), "up");
        assert_eq!(LinkStatus::Down.to_string(), "down");
    }
}
