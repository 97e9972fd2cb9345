//! Constructors and editing operations of the action registry.
//!
//! Every constructor allocates ids, registers parameters first and the
//! action last, and publishes the matching change.

use std::collections::{HashMap, HashSet};

use synhub_domain::action::{
    Action, ActionBody, ActionItem, ActionKind, Conditional, DELAY_TYPE_NAME, MAX_DELAY_SECS,
    delay_seconds_template, loop_count_template, loops_template,
};
use synhub_domain::change::Change;
use synhub_domain::device::{DeviceDescriptor, DeviceFunction, ParameterDescriptor};
use synhub_domain::error::{IdentityError, StructuralError, SynhubError, ValidationError};
use synhub_domain::id::{ActionId, ParamId};
use synhub_domain::parameter::{ActionParameter, ParamOwner, ParamRole, Parameter};
use synhub_domain::value::Value;

use super::{ActionRegistry, not_found};

fn descriptor_default(descriptor: &ParameterDescriptor) -> Value {
    descriptor
        .default
        .clone()
        .unwrap_or_else(|| Value::default_for(descriptor.data_type))
}

impl ActionRegistry {
    fn install(&self, action: Action) -> Result<ActionId, SynhubError> {
        let id = action.id();
        if !self.add_action(action) {
            return Err(IdentityError::Duplicate(id.as_raw()).into());
        }
        Ok(id)
    }

    fn instantiate(&self, template: &ActionParameter, owner: ParamOwner) -> ParamId {
        let id = self.new_param_id();
        self.register_parameter(template.duplicate(id, owner));
        id
    }

    /// Bind each of `parameters` for `owner`: fresh parameters whose source
    /// is the bound one.
    fn bind_parameters(&self, parameters: &[ParamId], owner: ParamOwner) -> Vec<ParamId> {
        parameters
            .iter()
            .filter_map(|source| {
                let source = self.parameter(*source)?;
                let id = self.new_param_id();
                self.register_parameter(source.bind(id, owner));
                Some(id)
            })
            .collect()
    }

    /// Create a named delay in the system bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] for more than a day.
    #[tracing::instrument(skip(self))]
    pub fn create_delay_action(&self, seconds: u32) -> Result<ActionId, SynhubError> {
        let name = self.generate_unique_name(DELAY_TYPE_NAME);
        self.create_delay(name, seconds)
    }

    fn create_delay(&self, name: String, seconds: u32) -> Result<ActionId, SynhubError> {
        if seconds > MAX_DELAY_SECS {
            return Err(ValidationError::OutOfRange {
                value: i128::from(seconds),
                min: 0,
                max: i128::from(MAX_DELAY_SECS),
            }
            .into());
        }
        let id = self.new_action_id();
        let mut action = Action::new(name, ActionBody::Delay);
        action.assign_id(id)?;
        action.parameters.push(self.instantiate(
            &delay_seconds_template(seconds),
            ParamOwner::Action(id),
        ));
        self.install(action)
    }

    /// Create an empty sequence in the user bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name.
    #[tracing::instrument(skip(self))]
    pub fn create_sequence_action(&self, name: &str) -> Result<ActionId, SynhubError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let id = self.new_action_id();
        let owner = ParamOwner::Action(id);
        let mut action = Action::new(
            self.generate_unique_name(name),
            ActionBody::Sequence { items: Vec::new() },
        );
        action.assign_id(id)?;
        action.parameters = vec![
            self.instantiate(&loops_template(), owner),
            self.instantiate(&loop_count_template(), owner),
        ];
        self.install(action)
    }

    /// Create the per-event binding of `target`. The binding is tracked only
    /// in the by-id table; its event owns it.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] if `target` is unknown and
    /// [`StructuralError::SelfReference`] if it is itself an event binding.
    #[tracing::instrument(skip(self))]
    pub fn create_event_action(&self, target: ActionId) -> Result<ActionId, SynhubError> {
        let target_action = self.action(target).ok_or_else(|| not_found("Action", target))?;
        if target_action.kind() == ActionKind::Event {
            return Err(StructuralError::SelfReference(target.as_raw()).into());
        }
        let id = self.new_action_id();
        let mut action = Action::new(
            target_action.name.clone(),
            ActionBody::Event {
                target,
                conditionals: Vec::new(),
            },
        );
        action.assign_id(id)?;
        action.parameters = self.bind_parameters(
            &self.exposed_parameters(&target_action),
            ParamOwner::Action(id),
        );
        self.install(action)
    }

    /// Attach a guard to an event binding.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] if `action` is not an event binding
    /// or the compared parameter does not exist.
    pub fn add_conditional(
        &self,
        action: ActionId,
        conditional: Conditional,
    ) -> Result<(), SynhubError> {
        if self.parameter(conditional.parameter).is_none() {
            return Err(not_found("Parameter", conditional.parameter).into());
        }
        let cell = self
            .cell(action)
            .filter(|cell| cell.kind() == ActionKind::Event)
            .ok_or_else(|| not_found("EventAction", action))?;
        cell.update(|a| {
            if let ActionBody::Event { conditionals, .. } = &mut a.body {
                conditionals.push(conditional);
            }
        });
        Ok(())
    }

    /// Whether every guard of an event binding passes. Other actions have
    /// no guards.
    #[must_use]
    pub fn conditionals_pass(&self, action: ActionId) -> bool {
        let Some(action) = self.action(action) else {
            return false;
        };
        match &action.body {
            ActionBody::Event { conditionals, .. } => conditionals.iter().all(|c| c.passes(self)),
            _ => true,
        }
    }

    // ── Device actions ───────────────────────────────────────────────

    /// Reconcile the device bucket with the device's function list: one
    /// action per function, matched by function id. A function whose
    /// parameters changed keeps its action id; the action and everything
    /// bound to it are updated in place. Returns how many actions were
    /// created.
    #[tracing::instrument(skip(self, device), fields(device = %device.id))]
    pub fn refresh_device_actions(&self, device: &DeviceDescriptor) -> usize {
        let existing = self.device_actions(device.id);
        for action in &existing {
            if let ActionBody::Device { function, .. } = &action.body
                && device.function(*function).is_none()
            {
                self.remove_action(action.id());
            }
        }
        let mut created = 0;
        for function in &device.functions {
            let current = existing.iter().find(|a| {
                matches!(a.body, ActionBody::Device { function: f, .. } if f == function.id)
            });
            match current {
                Some(action) if self.parameters_match(action, function) => {}
                Some(action) => {
                    if let Err(error) = self.update_device_action(action, function) {
                        tracing::warn!(function = %function.name, %error, "cannot update device action");
                    }
                }
                None => match self.create_device_action(device, function) {
                    Ok(_) => created += 1,
                    Err(error) => {
                        tracing::warn!(function = %function.name, %error, "cannot generate device action");
                    }
                },
            }
        }
        created
    }

    fn parameters_match(&self, action: &Action, function: &DeviceFunction) -> bool {
        action.parameters.len() == function.parameters.len()
            && action
                .parameters
                .iter()
                .zip(&function.parameters)
                .all(|(id, descriptor)| {
                    self.parameter(*id).is_some_and(|p| {
                        p.name() == descriptor.name
                            && p.param.data_type == descriptor.data_type
                            && p.param.validation == descriptor.validation
                    })
                })
    }

    fn device_parameter(
        &self,
        descriptor: &ParameterDescriptor,
        owner: ParamOwner,
    ) -> Result<ActionParameter, SynhubError> {
        let param = Parameter::builder()
            .id(self.new_param_id())
            .owner(owner)
            .name(descriptor.name.clone())
            .data_type(descriptor.data_type)
            .validation(descriptor.validation.clone())
            .value(descriptor_default(descriptor))
            .build()?;
        Ok(ActionParameter::new(param, ParamRole::Input))
    }

    fn create_device_action(
        &self,
        device: &DeviceDescriptor,
        function: &DeviceFunction,
    ) -> Result<ActionId, SynhubError> {
        let id = self.new_action_id();
        let owner = ParamOwner::Action(id);
        let parameters = function
            .parameters
            .iter()
            .map(|descriptor| self.device_parameter(descriptor, owner))
            .collect::<Result<Vec<_>, _>>()?;
        let mut action = Action::new(
            self.generate_unique_name(&format!("{} {}", device.name, function.name)),
            ActionBody::Device {
                device: device.id,
                function: function.id,
            },
        );
        action.assign_id(id)?;
        action.parameters = parameters.iter().map(ActionParameter::id).collect();
        for parameter in parameters {
            self.register_parameter(parameter);
        }
        self.install(action)
    }

    /// Conform a device action to a changed function signature. Parameters
    /// are matched by name and keep their ids; sequence items and event
    /// bindings that use the action are conformed to the new parameters.
    fn update_device_action(
        &self,
        action: &Action,
        function: &DeviceFunction,
    ) -> Result<(), SynhubError> {
        let id = action.id();
        let owner = ParamOwner::Action(id);
        let cell = self.cell(id).ok_or_else(|| not_found("Action", id))?;
        let mut kept = Vec::with_capacity(function.parameters.len());
        let mut added = Vec::new();
        for descriptor in &function.parameters {
            let existing = action
                .parameters
                .iter()
                .copied()
                .find(|p| self.parameter(*p).is_some_and(|p| p.name() == descriptor.name));
            if let Some(parameter) = existing {
                self.update_parameter(parameter, |p| {
                    p.param.conform(
                        descriptor.data_type,
                        descriptor.validation.clone(),
                        descriptor_default(descriptor),
                    );
                });
                kept.push(parameter);
            } else {
                let parameter = self.device_parameter(descriptor, owner)?;
                kept.push(parameter.id());
                added.push(parameter);
            }
        }
        for parameter in added {
            self.register_parameter(parameter);
        }
        let stale: Vec<ParamId> = action
            .parameters
            .iter()
            .copied()
            .filter(|p| !kept.contains(p))
            .collect();
        self.forget_parameters(&stale);
        cell.update(|a| a.parameters.clone_from(&kept));
        tracing::info!(action = %id, parameters = kept.len(), "device action updated");
        self.publish_parameters_changed(Some(owner));
        self.conform_users_of(id);
        Ok(())
    }

    /// Conform every sequence item and event binding that uses `target` to
    /// its current exposed parameters, then the users of every conformed
    /// sequence in turn.
    fn conform_users_of(&self, target: ActionId) {
        self.conform_users(target, &mut HashSet::new());
    }

    fn conform_users(&self, target: ActionId, visited: &mut HashSet<ActionId>) {
        if !visited.insert(target) {
            return;
        }
        let Some(updated) = self.action(target) else {
            return;
        };
        let exposed = self.exposed_parameters(&updated);
        for user in self.all_actions() {
            let owner = ParamOwner::Action(user.id());
            let Some(cell) = self.cell(user.id()) else {
                continue;
            };
            let touched = match &user.body {
                ActionBody::Sequence { items } => {
                    let mut touched = false;
                    for (index, item) in items.iter().enumerate() {
                        if item.action != target {
                            continue;
                        }
                        let parameters = self.conform_bindings(&item.parameters, &exposed, owner);
                        cell.update(|a| {
                            if let ActionBody::Sequence { items } = &mut a.body
                                && let Some(item) = items.get_mut(index)
                            {
                                item.parameters = parameters;
                            }
                        });
                        touched = true;
                    }
                    touched
                }
                ActionBody::Event { target: bound, .. } if *bound == target => {
                    let parameters = self.conform_bindings(&user.parameters, &exposed, owner);
                    cell.update(|a| a.parameters = parameters);
                    true
                }
                _ => false,
            };
            if touched {
                self.publish_parameters_changed(Some(owner));
                if user.kind() == ActionKind::Sequence {
                    self.conform_users(user.id(), visited);
                }
            }
        }
    }

    /// One binding per exposed parameter, in order. Existing bindings are
    /// kept and take the source's type and rule; bindings of vanished
    /// parameters are dropped.
    fn conform_bindings(
        &self,
        bound: &[ParamId],
        exposed: &[ParamId],
        owner: ParamOwner,
    ) -> Vec<ParamId> {
        let mut conformed = Vec::with_capacity(exposed.len());
        for source in exposed {
            let Some(source_param) = self.parameter(*source) else {
                continue;
            };
            let existing = bound
                .iter()
                .copied()
                .find(|b| self.parameter(*b).is_some_and(|p| p.param.source == Some(*source)));
            match existing {
                Some(binding) => {
                    self.update_parameter(binding, |p| {
                        p.param.conform(
                            source_param.param.data_type,
                            source_param.param.validation.clone(),
                            source_param.param.raw_value().clone(),
                        );
                    });
                    conformed.push(binding);
                }
                None => conformed.extend(self.bind_parameters(&[*source], owner)),
            }
        }
        let stale: Vec<ParamId> = bound
            .iter()
            .copied()
            .filter(|b| !conformed.contains(b))
            .collect();
        self.forget_parameters(&stale);
        conformed
    }

    // ── Sequences ────────────────────────────────────────────────────

    /// Append `action` to a sequence, binding its exposed parameters.
    /// [`ActionId::DELAY_TYPE`] appends a new anonymous delay the sequence
    /// owns. Returns the item index.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for unknown ids,
    /// [`StructuralError::NotASequence`] if `sequence` is not one, and
    /// [`StructuralError::SelfReference`] when adding a sequence to itself
    /// or adding an event binding.
    #[tracing::instrument(skip(self))]
    pub fn add_sequence_item(
        &self,
        sequence: ActionId,
        action: ActionId,
    ) -> Result<usize, SynhubError> {
        let cell = self
            .cell(sequence)
            .ok_or_else(|| not_found("Action", sequence))?;
        if cell.kind() != ActionKind::Sequence {
            return Err(StructuralError::NotASequence(sequence.as_raw()).into());
        }
        if action == sequence {
            return Err(StructuralError::SelfReference(sequence.as_raw()).into());
        }
        let (target, owned) = if action == ActionId::DELAY_TYPE {
            (self.create_delay(DELAY_TYPE_NAME.to_string(), 0)?, true)
        } else {
            (action, false)
        };
        let target_action = self.action(target).ok_or_else(|| not_found("Action", target))?;
        if target_action.kind() == ActionKind::Event {
            return Err(StructuralError::SelfReference(target.as_raw()).into());
        }
        let parameters = self.bind_parameters(
            &self.exposed_parameters(&target_action),
            ParamOwner::Action(sequence),
        );
        let index = cell.update(|a| match &mut a.body {
            ActionBody::Sequence { items } => {
                items.push(ActionItem {
                    action: target,
                    parameters,
                    owned,
                });
                items.len() - 1
            }
            _ => 0,
        });
        self.publisher
            .publish(Change::ParametersChanged { action: sequence });
        Ok(index)
    }

    /// Remove one item, its bound parameters and an owned delay.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`], [`StructuralError::NotASequence`]
    /// or [`StructuralError::ItemOutOfRange`].
    #[tracing::instrument(skip(self))]
    pub fn remove_sequence_item(&self, sequence: ActionId, index: usize) -> Result<(), SynhubError> {
        let cell = self
            .cell(sequence)
            .ok_or_else(|| not_found("Action", sequence))?;
        let item = cell.update(|a| match &mut a.body {
            ActionBody::Sequence { items } if index < items.len() => Ok(items.remove(index)),
            ActionBody::Sequence { items } => Err(StructuralError::ItemOutOfRange {
                index,
                len: items.len(),
            }),
            _ => Err(StructuralError::NotASequence(sequence.as_raw())),
        })?;
        self.forget_parameters(&item.parameters);
        if item.owned {
            self.remove_action(item.action);
        }
        self.publisher
            .publish(Change::ParametersChanged { action: sequence });
        Ok(())
    }

    // ── Parameters ───────────────────────────────────────────────────

    /// Make `parameter` read through `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for unknown ids and
    /// [`StructuralError::SelfReference`] when both are the same.
    pub fn set_dependency(&self, parameter: ParamId, target: ParamId) -> Result<(), SynhubError> {
        if parameter == target {
            return Err(StructuralError::SelfReference(parameter.as_raw()).into());
        }
        if self.parameter(target).is_none() {
            return Err(not_found("Parameter", target).into());
        }
        let owner = self
            .update_parameter(parameter, |p| {
                p.set_dependency(target);
                p.param.owner
            })
            .ok_or_else(|| not_found("Parameter", parameter))?;
        self.publish_parameters_changed(owner);
        Ok(())
    }

    /// Change a parameter's role; leaving DEPENDENT clears the dependency.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for an unknown parameter.
    pub fn set_role(&self, parameter: ParamId, role: ParamRole) -> Result<(), SynhubError> {
        let owner = self
            .update_parameter(parameter, |p| {
                p.set_role(role);
                p.param.owner
            })
            .ok_or_else(|| not_found("Parameter", parameter))?;
        self.publish_parameters_changed(owner);
        Ok(())
    }

    /// Write a value from outside the owner, checking type and rule.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`], the rule's
    /// [`SynhubError::Validation`], or [`StructuralError::WriteToDependent`]
    /// / [`StructuralError::WriteToInternal`] for those roles.
    pub fn set_parameter_value(&self, parameter: ParamId, value: Value) -> Result<(), SynhubError> {
        let owner = self
            .update_parameter(parameter, |p| {
                p.param.validate_value(&value)?;
                p.set_value(value)?;
                Ok::<_, SynhubError>(p.param.owner)
            })
            .ok_or_else(|| not_found("Parameter", parameter))??;
        self.publish_parameters_changed(owner);
        Ok(())
    }

    /// Write a value as the owner (loop counters, trigger measurements).
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] or the write's error.
    pub fn set_internal_value(&self, parameter: ParamId, value: Value) -> Result<(), SynhubError> {
        self.update_parameter(parameter, |p| p.set_internal_value(value))
            .ok_or_else(|| not_found("Parameter", parameter))?
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Rename an action.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] or [`SynhubError::NotFound`].
    pub fn rename_action(&self, id: ActionId, name: &str) -> Result<(), SynhubError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let cell = self.cell(id).ok_or_else(|| not_found("Action", id))?;
        cell.update(|a| a.name = name.to_string());
        self.publisher.publish(Change::ActionRenamed {
            action: id,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Deep copy with fresh ids and a unique name; `parent` points at the
    /// source. Owned delays are copied too, and dependencies between the
    /// source's own parameters are relinked to the copy by position.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for an unknown action and
    /// [`StructuralError::MissingParameter`] if the source references a
    /// parameter that does not exist.
    #[tracing::instrument(skip(self))]
    pub fn duplicate_action(&self, id: ActionId) -> Result<ActionId, SynhubError> {
        let source = self.action(id).ok_or_else(|| not_found("Action", id))?;
        let copy_id = self.new_action_id();
        let owner = ParamOwner::Action(copy_id);
        let mut mapping = HashMap::new();
        let mut copies = Vec::new();

        let own = self.duplicate_parameters(&source.parameters, owner, &mut mapping, &mut copies)?;
        let body = match &source.body {
            ActionBody::Sequence { items } => {
                let mut delays = Vec::new();
                match self.duplicate_items(items, owner, &mut mapping, &mut copies, &mut delays) {
                    Ok(items) => ActionBody::Sequence { items },
                    Err(error) => {
                        for delay in delays {
                            self.remove_action(delay);
                        }
                        return Err(error);
                    }
                }
            }
            other => other.clone(),
        };

        for copy in &mut copies {
            if let Some(target) = copy.dependency()
                && let Some(relinked) = mapping.get(&target)
            {
                copy.set_dependency(*relinked);
            }
        }
        for copy in copies {
            self.register_parameter(copy);
        }

        let mut action = Action::copy_of(&source, self.generate_unique_name(&source.name), body);
        action.assign_id(copy_id)?;
        action.parameters = own;
        self.install(action)
    }

    fn duplicate_items(
        &self,
        items: &[ActionItem],
        owner: ParamOwner,
        mapping: &mut HashMap<ParamId, ParamId>,
        copies: &mut Vec<ActionParameter>,
        delays: &mut Vec<ActionId>,
    ) -> Result<Vec<ActionItem>, SynhubError> {
        let mut duplicated = Vec::with_capacity(items.len());
        for item in items {
            let first_copy = copies.len();
            let parameters = self.duplicate_parameters(&item.parameters, owner, mapping, copies)?;
            let action = if item.owned {
                let delay = self.duplicate_action(item.action)?;
                delays.push(delay);
                let rebind = self.positional_map(item.action, delay);
                for copy in &mut copies[first_copy..] {
                    copy.param.source = copy
                        .param
                        .source
                        .map(|s| rebind.get(&s).copied().unwrap_or(s));
                }
                delay
            } else {
                item.action
            };
            duplicated.push(ActionItem {
                action,
                parameters,
                owned: item.owned,
            });
        }
        Ok(duplicated)
    }

    fn duplicate_parameters(
        &self,
        parameters: &[ParamId],
        owner: ParamOwner,
        mapping: &mut HashMap<ParamId, ParamId>,
        copies: &mut Vec<ActionParameter>,
    ) -> Result<Vec<ParamId>, StructuralError> {
        let mut ids = Vec::with_capacity(parameters.len());
        for original in parameters {
            let parameter = self
                .parameter(*original)
                .ok_or(StructuralError::MissingParameter(original.as_raw()))?;
            let id = loop {
                let candidate = self.new_param_id();
                if !mapping.values().any(|taken| *taken == candidate) {
                    break candidate;
                }
            };
            mapping.insert(*original, id);
            copies.push(parameter.duplicate(id, owner));
            ids.push(id);
        }
        Ok(ids)
    }

    fn positional_map(&self, from: ActionId, to: ActionId) -> HashMap<ParamId, ParamId> {
        match (self.action(from), self.action(to)) {
            (Some(from), Some(to)) => from
                .all_parameters()
                .into_iter()
                .zip(to.all_parameters())
                .collect(),
            _ => HashMap::new(),
        }
    }
}
