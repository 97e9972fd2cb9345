//! Parameters: typed, validated value slots with lineage.
//!
//! A [`Parameter`] carries a datatype, a validation rule and a raw value.
//! Its owner and its `source` (the parameter it was copied from) are plain
//! identifiers, resolved through a [`ParameterResolver`] at read time so that
//! deleting or loading objects in any order cannot leave dangling pointers.
//!
//! An [`ActionParameter`] adds a [`ParamRole`]. A `Dependent` parameter has
//! no value of its own: reading it follows its dependency through the
//! resolver, writing it fails.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, StructuralError, SynhubError, ValidationError};
use crate::id::{ActionId, ParamId, TriggerId};
use crate::validation::ValidationRule;
use crate::value::{DataType, Value};

/// How many dependency hops are followed before a chain is considered cyclic.
pub const MAX_DEPENDENCY_DEPTH: usize = 16;

/// Read access to live parameters and action names.
///
/// Implemented by the action registry; tests implement it over a map.
pub trait ParameterResolver {
    /// Snapshot of a registered parameter.
    fn parameter(&self, id: ParamId) -> Option<ActionParameter>;

    /// Name of a registered action.
    fn action_name(&self, id: ActionId) -> Option<String>;
}

/// The entity a parameter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ParamOwner {
    Action(ActionId),
    Trigger(TriggerId),
}

/// How an action parameter obtains its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    /// Supplied by whoever invokes the action.
    #[default]
    Input,
    /// Fixed at design time.
    Constant,
    /// Read through another parameter's identifier.
    Dependent,
    /// Written only by the owning action or trigger (loop counter, measurement).
    Internal,
}

impl std::fmt::Display for ParamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Constant => f.write_str("constant"),
            Self::Dependent => f.write_str("dependent"),
            Self::Internal => f.write_str("internal"),
        }
    }
}

/// A typed value slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    id: ParamId,
    pub owner: Option<ParamOwner>,
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub validation: ValidationRule,
    value: Value,
    /// Parameter this one was copied from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ParamId>,
}

impl Parameter {
    /// Create a builder for constructing a [`Parameter`].
    #[must_use]
    pub fn builder() -> ParameterBuilder {
        ParameterBuilder::default()
    }

    /// Unregistered parameter from trusted, well-formed parts.
    pub(crate) fn template(
        name: &str,
        data_type: DataType,
        validation: ValidationRule,
        value: Value,
    ) -> Self {
        debug_assert_eq!(value.data_type(), data_type);
        Self {
            id: ParamId::from_raw(0),
            owner: None,
            name: name.to_string(),
            data_type,
            validation,
            value,
            source: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ParamId {
        self.id
    }

    /// Assign the identifier once.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Zero`] for the zero id and
    /// [`IdentityError::AlreadyAssigned`] if an id was set before.
    pub fn assign_id(&mut self, id: ParamId) -> Result<(), IdentityError> {
        if id.is_zero() {
            return Err(IdentityError::Zero);
        }
        if !self.id.is_zero() {
            return Err(IdentityError::AlreadyAssigned(self.id.as_raw()));
        }
        self.id = id;
        Ok(())
    }

    /// Raw stored value.
    #[must_use]
    pub fn raw_value(&self) -> &Value {
        &self.value
    }

    /// Replace the raw value, keeping the datatype.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::TypeMismatch`] if `value` has another datatype.
    pub fn set_raw_value(&mut self, value: Value) -> Result<(), ValidationError> {
        if value.data_type() != self.data_type {
            return Err(ValidationError::TypeMismatch {
                expected: self.data_type,
            });
        }
        self.value = value;
        Ok(())
    }

    /// Adopt a new datatype and rule. The stored value is kept while it still
    /// fits and replaced by `fallback` otherwise.
    pub fn conform(&mut self, data_type: DataType, validation: ValidationRule, fallback: Value) {
        self.data_type = data_type;
        self.validation = validation;
        if self.value.data_type() != data_type || self.validate_value(&self.value).is_err() {
            self.value = fallback;
        }
    }

    /// Check the stored value against the validation rule.
    ///
    /// # Errors
    ///
    /// Returns the rule's [`ValidationError`].
    pub fn validate_value(&self, value: &Value) -> Result<(), ValidationError> {
        self.validation.check(self.data_type, value)
    }

    /// Human-readable qualified name: `"<action>.<source parameter>"`.
    ///
    /// Walks parameter → source parameter → the source's owning action.
    /// Falls back to the source's name when its owner is not an action or is
    /// unknown, and to this parameter's own name when there is no source.
    pub fn full_name<R: ParameterResolver + ?Sized>(&self, resolver: &R) -> String {
        let Some(source) = self.source.and_then(|id| resolver.parameter(id)) else {
            return self.name.clone();
        };
        match source.param.owner {
            Some(ParamOwner::Action(action)) => match resolver.action_name(action) {
                Some(action_name) => format!("{action_name}.{}", source.param.name),
                None => source.param.name,
            },
            _ => source.param.name,
        }
    }
}

/// Step-by-step builder for [`Parameter`].
#[derive(Debug, Default)]
pub struct ParameterBuilder {
    id: Option<ParamId>,
    owner: Option<ParamOwner>,
    name: Option<String>,
    data_type: Option<DataType>,
    validation: ValidationRule,
    value: Option<Value>,
    source: Option<ParamId>,
}

impl ParameterBuilder {
    #[must_use]
    pub fn id(mut self, id: ParamId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn owner(mut self, owner: ParamOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    #[must_use]
    pub fn validation(mut self, validation: ValidationRule) -> Self {
        self.validation = validation;
        self
    }

    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn source(mut self, source: ParamId) -> Self {
        self.source = Some(source);
        self
    }

    /// Consume the builder and return a [`Parameter`].
    ///
    /// The datatype defaults to the initial value's datatype, or `Void`; the
    /// value defaults to the datatype's zero value.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] if no name was given and
    /// [`ValidationError::TypeMismatch`] if the initial value disagrees with
    /// the datatype.
    pub fn build(self) -> Result<Parameter, ValidationError> {
        let name = self.name.unwrap_or_default();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let data_type = self
            .data_type
            .or_else(|| self.value.as_ref().map(Value::data_type))
            .unwrap_or(DataType::Void);
        let value = self.value.unwrap_or_else(|| Value::default_for(data_type));
        if value.data_type() != data_type {
            return Err(ValidationError::TypeMismatch {
                expected: data_type,
            });
        }
        Ok(Parameter {
            id: self.id.unwrap_or(ParamId::from_raw(0)),
            owner: self.owner,
            name,
            data_type,
            validation: self.validation,
            value,
            source: self.source,
        })
    }
}

/// A parameter with a role, as bound to an action or trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionParameter {
    #[serde(flatten)]
    pub param: Parameter,
    role: ParamRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dependency: Option<ParamId>,
}

impl ActionParameter {
    #[must_use]
    pub fn new(param: Parameter, role: ParamRole) -> Self {
        Self {
            param,
            role,
            dependency: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ParamId {
        self.param.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.param.name
    }

    #[must_use]
    pub fn role(&self) -> ParamRole {
        self.role
    }

    #[must_use]
    pub fn dependency(&self) -> Option<ParamId> {
        if self.role == ParamRole::Dependent {
            self.dependency
        } else {
            None
        }
    }

    /// Change the role. Leaving `Dependent` clears the dependency.
    pub fn set_role(&mut self, role: ParamRole) {
        if role != ParamRole::Dependent {
            self.dependency = None;
        }
        self.role = role;
    }

    /// Make this parameter read its value through `target`.
    pub fn set_dependency(&mut self, target: ParamId) {
        self.role = ParamRole::Dependent;
        self.dependency = Some(target);
    }

    /// Write a value from outside the owner.
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::WriteToDependent`] or
    /// [`StructuralError::WriteToInternal`] for those roles, and
    /// [`ValidationError::TypeMismatch`] for a value of another datatype.
    pub fn set_value(&mut self, value: Value) -> Result<(), SynhubError> {
        match self.role {
            ParamRole::Dependent => {
                Err(StructuralError::WriteToDependent(self.id().as_raw()).into())
            }
            ParamRole::Internal => {
                Err(StructuralError::WriteToInternal(self.id().as_raw()).into())
            }
            ParamRole::Input | ParamRole::Constant => Ok(self.param.set_raw_value(value)?),
        }
    }

    /// Write a value as the owner (loop counters, trigger measurements).
    ///
    /// # Errors
    ///
    /// Returns [`StructuralError::WriteToDependent`] for dependent parameters
    /// and [`ValidationError::TypeMismatch`] for a value of another datatype.
    pub fn set_internal_value(&mut self, value: Value) -> Result<(), SynhubError> {
        if self.role == ParamRole::Dependent {
            return Err(StructuralError::WriteToDependent(self.id().as_raw()).into());
        }
        Ok(self.param.set_raw_value(value)?)
    }

    /// Current value, following dependencies through `resolver`.
    ///
    /// Returns `None` when a dependency is dangling or the chain is longer
    /// than [`MAX_DEPENDENCY_DEPTH`] (which covers cycles).
    pub fn current_value<R: ParameterResolver + ?Sized>(&self, resolver: &R) -> Option<Value> {
        let mut current: Cow<'_, Self> = Cow::Borrowed(self);
        for _ in 0..=MAX_DEPENDENCY_DEPTH {
            match current.dependency() {
                None => return Some(current.param.raw_value().clone()),
                Some(target) => current = Cow::Owned(resolver.parameter(target)?),
            }
        }
        None
    }

    /// Resolve the current value and check it against this parameter's rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Unresolvable`] if the value cannot be
    /// resolved, or the rule's error.
    pub fn validated_value<R: ParameterResolver + ?Sized>(
        &self,
        resolver: &R,
    ) -> Result<Value, ValidationError> {
        let value = self
            .current_value(resolver)
            .ok_or(ValidationError::Unresolvable)?;
        self.param.validate_value(&value)?;
        Ok(value)
    }

    /// Copy everything except identity; the copy's source is this parameter's
    /// source (lineage is preserved, not re-pointed at the copy's original).
    #[must_use]
    pub fn duplicate(&self, id: ParamId, owner: ParamOwner) -> Self {
        let mut copy = self.clone();
        copy.param.id = id;
        copy.param.owner = Some(owner);
        copy
    }

    /// Create a binding of `self` for another owner: a fresh parameter whose
    /// source is `self`, carrying the same type, rule, value and role.
    ///
    /// Dependencies are kept as-is; callers relink them when the target was
    /// copied too.
    #[must_use]
    pub fn bind(&self, id: ParamId, owner: ParamOwner) -> Self {
        let mut copy = self.duplicate(id, owner);
        copy.param.source = Some(self.id());
        copy
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub(crate) struct MapResolver {
        pub params: HashMap<ParamId, ActionParameter>,
        pub actions: HashMap<ActionId, String>,
    }

    impl MapResolver {
        pub fn insert(&mut self, param: ActionParameter) {
            self.params.insert(param.id(), param);
        }
    }

    impl ParameterResolver for MapResolver {
        fn parameter(&self, id: ParamId) -> Option<ActionParameter> {
            self.params.get(&id).cloned()
        }

        fn action_name(&self, id: ActionId) -> Option<String> {
            self.actions.get(&id).cloned()
        }
    }

    pub(crate) fn word_param(raw: u64, name: &str, value: u16, role: ParamRole) -> ActionParameter {
        let param = Parameter::builder()
            .id(ParamId::from_raw(raw))
            .name(name)
            .value(Value::Word(value))
            .build()
            .unwrap();
        ActionParameter::new(param, role)
    }

    #[test]
    fn should_default_value_to_datatype_zero() {
        let p = Parameter::builder()
            .name("Level")
            .data_type(DataType::Byte)
            .build()
            .unwrap();
        assert_eq!(p.raw_value(), &Value::Byte(0));
    }

    #[test]
    fn should_reject_empty_name() {
        let result = Parameter::builder().data_type(DataType::Bool).build();
        assert_eq!(result, Err(ValidationError::EmptyName));
    }

    #[test]
    fn should_reject_initial_value_of_other_datatype() {
        let result = Parameter::builder()
            .name("x")
            .data_type(DataType::Word)
            .value(Value::Byte(1))
            .build();
        assert!(matches!(result, Err(ValidationError::TypeMismatch { .. })));
    }

    #[test]
    fn should_keep_value_that_fits_new_rule() {
        let mut p = Parameter::builder()
            .name("Level")
            .data_type(DataType::Byte)
            .validation(ValidationRule::Unsigned { min: 0, max: 100 })
            .value(Value::Byte(80))
            .build()
            .unwrap();
        p.conform(
            DataType::Byte,
            ValidationRule::Unsigned { min: 0, max: 200 },
            Value::Byte(0),
        );
        assert_eq!(p.raw_value(), &Value::Byte(80));
        assert_eq!(p.validation, ValidationRule::Unsigned { min: 0, max: 200 });

        p.conform(
            DataType::Byte,
            ValidationRule::Unsigned { min: 0, max: 50 },
            Value::Byte(10),
        );
        assert_eq!(p.raw_value(), &Value::Byte(10));

        p.conform(DataType::Word, ValidationRule::FullRange, Value::Word(3));
        assert_eq!(p.raw_value(), &Value::Word(3));
    }

    #[test]
    fn should_assign_identifier_only_once() {
        let mut p = Parameter::builder().name("x").build().unwrap();
        assert!(p.id().is_zero());
        assert_eq!(p.assign_id(ParamId::from_raw(0)), Err(IdentityError::Zero));
        p.assign_id(ParamId::from_raw(5)).unwrap();
        assert_eq!(
            p.assign_id(ParamId::from_raw(6)),
            Err(IdentityError::AlreadyAssigned(5))
        );
        assert_eq!(p.id(), ParamId::from_raw(5));
    }

    #[test]
    fn should_clear_dependency_when_role_changes() {
        let mut p = word_param(1, "a", 0, ParamRole::Input);
        p.set_dependency(ParamId::from_raw(2));
        assert_eq!(p.role(), ParamRole::Dependent);
        assert_eq!(p.dependency(), Some(ParamId::from_raw(2)));

        p.set_role(ParamRole::Constant);
        assert_eq!(p.dependency(), None);
        p.set_role(ParamRole::Dependent);
        assert_eq!(p.dependency(), None);
    }

    #[test]
    fn should_refuse_to_write_dependent_parameter() {
        let mut p = word_param(1, "a", 0, ParamRole::Input);
        p.set_dependency(ParamId::from_raw(2));
        let result = p.set_value(Value::Word(3));
        assert!(matches!(
            result,
            Err(SynhubError::Structural(StructuralError::WriteToDependent(1)))
        ));
    }

    #[test]
    fn should_refuse_external_write_to_internal_parameter() {
        let mut p = word_param(1, "Loop Count", 0, ParamRole::Internal);
        assert!(p.set_value(Value::Word(3)).is_err());
        p.set_internal_value(Value::Word(3)).unwrap();
        assert_eq!(p.param.raw_value(), &Value::Word(3));
    }

    #[test]
    fn should_read_dependent_value_through_resolver() {
        let mut resolver = MapResolver::default();
        resolver.insert(word_param(2, "b", 40, ParamRole::Input));
        let mut c = word_param(3, "c", 0, ParamRole::Input);
        c.set_dependency(ParamId::from_raw(2));
        resolver.insert(c);

        let mut a = word_param(1, "a", 0, ParamRole::Input);
        a.set_dependency(ParamId::from_raw(3));
        assert_eq!(a.current_value(&resolver), Some(Value::Word(40)));
    }

    #[test]
    fn should_report_unresolvable_for_cycles_and_dangling_targets() {
        let mut resolver = MapResolver::default();
        let mut a = word_param(1, "a", 0, ParamRole::Input);
        a.set_dependency(ParamId::from_raw(2));
        let mut b = word_param(2, "b", 0, ParamRole::Input);
        b.set_dependency(ParamId::from_raw(1));
        resolver.insert(a.clone());
        resolver.insert(b);
        assert_eq!(a.current_value(&resolver), None);

        let mut dangling = word_param(9, "d", 0, ParamRole::Input);
        dangling.set_dependency(ParamId::from_raw(77));
        assert_eq!(
            dangling.validated_value(&resolver),
            Err(ValidationError::Unresolvable)
        );
    }

    #[test]
    fn should_build_full_name_from_two_hops_of_lineage() {
        let mut resolver = MapResolver::default();
        let action = ActionId::from_raw(10);
        resolver.actions.insert(action, "Hall Light".to_string());
        let mut level = word_param(2, "Level", 0, ParamRole::Input);
        level.param.owner = Some(ParamOwner::Action(action));
        resolver.insert(level.clone());

        let bound = level.bind(ParamId::from_raw(3), ParamOwner::Action(ActionId::from_raw(11)));
        assert_eq!(bound.param.full_name(&resolver), "Hall Light.Level");
        assert_eq!(level.param.full_name(&resolver), "Level");
    }

    #[test]
    fn should_fall_back_to_source_name_when_owner_unknown() {
        let mut resolver = MapResolver::default();
        let mut level = word_param(2, "Level", 0, ParamRole::Input);
        level.param.owner = Some(ParamOwner::Action(ActionId::from_raw(99)));
        resolver.insert(level.clone());
        let bound = level.bind(ParamId::from_raw(3), ParamOwner::Action(ActionId::from_raw(11)));
        assert_eq!(bound.param.full_name(&resolver), "Level");
    }

    #[test]
    fn should_keep_role_and_dependency_on_duplicate() {
        let mut p = word_param(1, "a", 0, ParamRole::Input);
        p.set_dependency(ParamId::from_raw(4));
        let copy = p.duplicate(ParamId::from_raw(8), ParamOwner::Action(ActionId::from_raw(3)));
        assert_eq!(copy.id(), ParamId::from_raw(8));
        assert_eq!(copy.dependency(), Some(ParamId::from_raw(4)));
        assert_eq!(copy.param.owner, Some(ParamOwner::Action(ActionId::from_raw(3))));
    }

    #[test]
    fn should_roundtrip_action_parameter_through_serde_json() {
        let mut p = word_param(1, "a", 7, ParamRole::Input);
        p.set_dependency(ParamId::from_raw(2));
        let json = serde_json::to_string(&p).unwrap();
        let parsed: ActionParameter = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, p);
    }
}
