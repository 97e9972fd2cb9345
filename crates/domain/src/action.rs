//! Action: a unit of work with identity and an execution contract.
//!
//! The concrete variant is carried explicitly in [`ActionBody`] and decided
//! once at construction. Parameters are referenced by id; the parameter
//! objects themselves live in the registry's parameter table.

mod conditional;
mod item;

pub use conditional::{Comparison, Conditional};
pub use item::ActionItem;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, ValidationError};
use crate::id::{ActionId, DeviceId, FunctionId, ParamId};
use crate::parameter::{ActionParameter, ParamRole, Parameter};
use crate::validation::ValidationRule;
use crate::value::{DataType, Value};

/// Name of the delay duration parameter.
pub const DELAY_PARAM: &str = "Delay (seconds)";
/// Name of the sequence repetition parameter.
pub const LOOPS_PARAM: &str = "Number of Loops";
/// Name of the sequence iteration counter.
pub const LOOP_COUNT_PARAM: &str = "Loop Count";
/// Longest accepted delay: one day.
pub const MAX_DELAY_SECS: u32 = 86_400;
/// Display name of the built-in delay template.
pub const DELAY_TYPE_NAME: &str = "Delay";

/// Discriminator of the closed set of action variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Device,
    Delay,
    Sequence,
    Event,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device => f.write_str("device"),
            Self::Delay => f.write_str("delay"),
            Self::Sequence => f.write_str("sequence"),
            Self::Event => f.write_str("event"),
        }
    }
}

/// Variant-specific payload of an [`Action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionBody {
    /// Invoke one device function; the action's parameters are its arguments.
    Device {
        device: DeviceId,
        function: FunctionId,
    },
    /// Block the executing thread for the first parameter's seconds.
    Delay,
    /// Run `items` in order, repeated by the "Number of Loops" parameter.
    Sequence { items: Vec<ActionItem> },
    /// Per-event binding of `target` with guard conditionals.
    Event {
        target: ActionId,
        #[serde(default)]
        conditionals: Vec<Conditional>,
    },
}

impl ActionBody {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Device { .. } => ActionKind::Device,
            Self::Delay => ActionKind::Delay,
            Self::Sequence { .. } => ActionKind::Sequence,
            Self::Event { .. } => ActionKind::Event,
        }
    }
}

/// An executable unit: identity, name, lineage and parameter references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    id: ActionId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<ActionId>,
    /// Own parameters, in stable order.
    pub parameters: Vec<ParamId>,
    pub body: ActionBody,
}

impl Action {
    /// Create an action without identity. The registry assigns one.
    #[must_use]
    pub fn new(name: impl Into<String>, body: ActionBody) -> Self {
        Self {
            id: ActionId::from_raw(0),
            name: name.into(),
            parent: None,
            parameters: Vec::new(),
            body,
        }
    }

    /// The built-in delay template, identified by [`ActionId::DELAY_TYPE`].
    #[must_use]
    pub fn delay_type(parameter: ParamId) -> Self {
        Self {
            id: ActionId::DELAY_TYPE,
            name: DELAY_TYPE_NAME.to_string(),
            parent: None,
            parameters: vec![parameter],
            body: ActionBody::Delay,
        }
    }

    /// Copy construction: the only way to set `parent`.
    ///
    /// The copy starts without identity and without parameters; the caller
    /// duplicates parameters and items so that the copy owns fresh ids.
    #[must_use]
    pub fn copy_of(source: &Action, name: impl Into<String>, body: ActionBody) -> Self {
        Self {
            id: ActionId::from_raw(0),
            name: name.into(),
            parent: Some(source.id),
            parameters: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn parent(&self) -> Option<ActionId> {
        self.parent
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.body.kind()
    }

    /// Assign the identifier once.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Zero`] for the zero id and
    /// [`IdentityError::AlreadyAssigned`] if an id was set before.
    pub fn assign_id(&mut self, id: ActionId) -> Result<(), IdentityError> {
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
    /// Returns [`ValidationError::EmptyName`] when `name` is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    /// Sequence items, empty for other variants.
    #[must_use]
    pub fn items(&self) -> &[ActionItem] {
        match &self.body {
            ActionBody::Sequence { items } => items,
            _ => &[],
        }
    }

    /// Own parameters followed by every item's parameters, in item order.
    ///
    /// The order is stable and identical between an action and its copy,
    /// which is what positional dependency relinking relies on.
    #[must_use]
    pub fn all_parameters(&self) -> Vec<ParamId> {
        let mut all = self.parameters.clone();
        for item in self.items() {
            all.extend_from_slice(&item.parameters);
        }
        all
    }

    /// Actions this one privately owns (anonymous delays inside a sequence).
    #[must_use]
    pub fn owned_actions(&self) -> Vec<ActionId> {
        self.items()
            .iter()
            .filter(|item| item.owned)
            .map(|item| item.action)
            .collect()
    }

    /// The action an event binding forwards to.
    #[must_use]
    pub fn event_target(&self) -> Option<ActionId> {
        match &self.body {
            ActionBody::Event { target, .. } => Some(*target),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.kind(), self.name, self.id)
    }
}

/// Unregistered parameter template for a delay's duration.
#[must_use]
pub fn delay_seconds_template(seconds: u32) -> ActionParameter {
    ActionParameter::new(
        Parameter::template(
            DELAY_PARAM,
            DataType::DWord,
            ValidationRule::Unsigned {
                min: 0,
                max: u64::from(MAX_DELAY_SECS),
            },
            Value::DWord(seconds),
        ),
        ParamRole::Input,
    )
}

/// Unregistered parameter template for a sequence's repetition count.
#[must_use]
pub fn loops_template() -> ActionParameter {
    ActionParameter::new(
        Parameter::template(
            LOOPS_PARAM,
            DataType::Word,
            ValidationRule::FullRange,
            Value::Word(1),
        ),
        ParamRole::Input,
    )
}

/// Unregistered parameter template for a sequence's iteration counter.
#[must_use]
pub fn loop_count_template() -> ActionParameter {
    ActionParameter::new(
        Parameter::template(
            LOOP_COUNT_PARAM,
            DataType::Word,
            ValidationRule::FullRange,
            Value::Word(0),
        ),
        ParamRole::Internal,
    )
}
