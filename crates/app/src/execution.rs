//! Action execution: inline execution per variant and threaded dispatch.
//!
//! `Ok(false)` is a runtime failure (validation, lock contention, device
//! refusal) and `Err` a structural one that indicates a corrupted document.
//! Failures propagate as booleans through sequences and event bindings;
//! nothing retries.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use synhub_domain::action::{Action, ActionBody, ActionItem};
use synhub_domain::change::Change;
use synhub_domain::error::StructuralError;
use synhub_domain::id::{ActionId, DeviceId, FunctionId, ParamId};
use synhub_domain::parameter::ParamRole;
use synhub_domain::value::Value;

use crate::ports::DeviceGateway;
use crate::registry::{ActionCell, ActionRegistry};

/// Unlocks a device on every exit path.
struct DeviceLock<'a> {
    gateway: &'a dyn DeviceGateway,
    device: DeviceId,
}

impl Drop for DeviceLock<'_> {
    fn drop(&mut self) {
        self.gateway.unlock_device(self.device);
    }
}

impl ActionRegistry {
    /// Execute an action on the calling thread.
    ///
    /// An unknown id is an identity error: logged, reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns a [`StructuralError`] when the action references a missing
    /// sub-action or parameter.
    pub fn execute(&self, id: ActionId) -> Result<bool, StructuralError> {
        let Some(cell) = self.cell(id) else {
            tracing::warn!(%id, "executing unknown action");
            return Ok(false);
        };
        self.execute_cell(&cell)
    }

    /// Run an action on an idle worker without blocking.
    ///
    /// Returns `false` when the action is already running, unknown, or no
    /// worker is idle. The request is dropped in that case, never queued.
    pub fn execute_threaded(self: &Arc<Self>, id: ActionId) -> bool {
        let Some(cell) = self.cell(id) else {
            tracing::warn!(%id, "dispatching unknown action");
            return false;
        };
        if !cell.try_start() {
            tracing::debug!(%id, "action already running");
            return false;
        }
        let registry = Arc::clone(self);
        let job_cell = Arc::clone(&cell);
        let dispatched = self.pool.try_dispatch(Box::new(move || {
            registry.publisher.publish(Change::RunningChanged {
                action: id,
                running: true,
            });
            match registry.execute_cell(&job_cell) {
                Ok(true) => tracing::debug!(%id, "action succeeded"),
                Ok(false) => tracing::debug!(%id, "action failed"),
                Err(error) => tracing::error!(%id, %error, "action structurally broken"),
            }
            registry.finish(&job_cell);
        }));
        if !dispatched {
            tracing::warn!(%id, "no idle worker, dropping dispatch");
            cell.finish();
        }
        dispatched
    }

    fn finish(&self, cell: &ActionCell) {
        cell.finish();
        self.publisher.publish(Change::RunningChanged {
            action: cell.id(),
            running: false,
        });
    }

    pub(crate) fn execute_cell(&self, cell: &ActionCell) -> Result<bool, StructuralError> {
        let action = cell.snapshot();
        match &action.body {
            ActionBody::Device { device, function } => {
                self.execute_device(&action, *device, *function)
            }
            ActionBody::Delay => self.execute_delay(&action),
            ActionBody::Sequence { items } => self.execute_sequence(&action, items),
            ActionBody::Event { target, .. } => self.execute_binding(cell, &action, *target),
        }
    }

    fn execute_device(
        &self,
        action: &Action,
        device: DeviceId,
        function: FunctionId,
    ) -> Result<bool, StructuralError> {
        if !self
            .gateway
            .lock_device(device, self.config.lock_timeout)
        {
            tracing::debug!(%device, "device busy");
            return Ok(false);
        }
        let _device = DeviceLock {
            gateway: self.gateway.as_ref(),
            device,
        };
        let mut args = Vec::with_capacity(action.parameters.len());
        for id in &action.parameters {
            let parameter = self
                .parameter(*id)
                .ok_or(StructuralError::MissingParameter(id.as_raw()))?;
            match parameter.validated_value(self) {
                Ok(value) => args.push(value),
                Err(error) => {
                    tracing::warn!(%action, parameter = parameter.name(), %error, "refusing to send");
                    return Ok(false);
                }
            }
        }
        Ok(self.gateway.send(device, function, &args))
    }

    fn first_value(&self, action: &Action, index: usize) -> Result<Option<u64>, StructuralError> {
        let id = action
            .parameters
            .get(index)
            .ok_or(StructuralError::MissingParameter(0))?;
        let parameter = self
            .parameter(*id)
            .ok_or(StructuralError::MissingParameter(id.as_raw()))?;
        match parameter.validated_value(self) {
            Ok(value) => Ok(value.as_unsigned()),
            Err(error) => {
                tracing::warn!(%action, parameter = parameter.name(), %error, "invalid parameter");
                Ok(None)
            }
        }
    }

    fn execute_delay(&self, action: &Action) -> Result<bool, StructuralError> {
        let Some(seconds) = self.first_value(action, 0)? else {
            return Ok(false);
        };
        if seconds > 0 {
            thread::sleep(Duration::from_secs(seconds));
        }
        Ok(true)
    }

    fn execute_sequence(&self, action: &Action, items: &[ActionItem]) -> Result<bool, StructuralError> {
        let Some(loops) = self.first_value(action, 0)? else {
            return Ok(false);
        };
        let counter = action.parameters.get(1).copied();
        let mut ok = true;
        for pass in 1..=loops {
            if let Some(counter) = counter {
                let value = Value::Word(u16::try_from(pass).unwrap_or(u16::MAX));
                if let Err(error) = self.set_internal_value(counter, value) {
                    tracing::warn!(%action, %error, "cannot update loop count");
                }
            }
            for item in items {
                ok &= self.execute_item(item)?;
            }
        }
        Ok(ok)
    }

    fn execute_item(&self, item: &ActionItem) -> Result<bool, StructuralError> {
        let cell = self
            .cell(item.action)
            .ok_or(StructuralError::MissingSubAction(item.action.as_raw()))?;
        let Some(_guard) = cell.try_lock(self.config.lock_timeout) else {
            tracing::debug!(action = %item.action, "sub-action busy");
            return Ok(false);
        };
        if !self.copy_bound_values(&item.parameters)? {
            return Ok(false);
        }
        self.execute_cell(&cell)
    }

    fn execute_binding(
        &self,
        cell: &ActionCell,
        action: &Action,
        target: ActionId,
    ) -> Result<bool, StructuralError> {
        let Some(_own) = cell.try_lock(self.config.lock_timeout) else {
            tracing::debug!(%action, "event action busy");
            return Ok(false);
        };
        let target_cell = self
            .cell(target)
            .ok_or(StructuralError::MissingSubAction(target.as_raw()))?;
        let Some(_target) = target_cell.try_lock(self.config.lock_timeout) else {
            tracing::debug!(%target, "target busy");
            return Ok(false);
        };
        if !self.copy_bound_values(&action.parameters)? {
            return Ok(false);
        }
        self.execute_cell(&target_cell)
    }

    /// Validate every bound parameter, then copy the values into the
    /// parameters they were bound from. Nothing is written if one fails.
    /// Bindings whose source is gone, DEPENDENT or INTERNAL are skipped.
    fn copy_bound_values(&self, parameters: &[ParamId]) -> Result<bool, StructuralError> {
        let mut writes = Vec::with_capacity(parameters.len());
        for id in parameters {
            let parameter = self
                .parameter(*id)
                .ok_or(StructuralError::MissingParameter(id.as_raw()))?;
            let Some(target) = parameter.param.source else {
                continue;
            };
            let writable = self
                .parameter(target)
                .is_some_and(|t| matches!(t.role(), ParamRole::Input | ParamRole::Constant));
            if !writable {
                continue;
            }
            match parameter.validated_value(self) {
                Ok(value) => writes.push((target, value)),
                Err(error) => {
                    tracing::warn!(parameter = parameter.name(), %error, "copy aborted");
                    return Ok(false);
                }
            }
        }
        for (target, value) in writes {
            if let Some(Err(error)) = self.update_parameter(target, |t| t.set_value(value)) {
                tracing::warn!(%target, %error, "copy aborted");
                return Ok(false);
            }
        }
        Ok(true)
    }
}
