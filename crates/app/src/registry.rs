//! Action registry: identity allocation, lookup, listing and dispatch.
//!
//! The registry owns two by-id tables, one for actions and one for
//! parameters, each behind its own lock. Parameters are stored flat and
//! shared by id: actions, sequence items, event bindings and triggers all
//! reference them, and dependent parameters resolve through the registry at
//! read time. No table lock is ever held while another object is resolved.
//!
//! A freshly constructed registry already contains the built-in delay
//! template under [`ActionId::DELAY_TYPE`].

mod buckets;
mod cell;
mod editing;

pub use cell::ActionCell;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use synhub_domain::action::{Action, ActionKind, delay_seconds_template};
use synhub_domain::change::Change;
use synhub_domain::error::NotFoundError;
use synhub_domain::id::{ActionId, DeviceId, ParamId};
use synhub_domain::parameter::{ActionParameter, ParamOwner, ParamRole, ParameterResolver};
use synhub_domain::value::Value;

use crate::config::EngineConfig;
use crate::pool::WorkerPool;
use crate::ports::{ChangePublisher, DeviceGateway};

use buckets::Buckets;

type ParamSlot = Arc<Mutex<ActionParameter>>;

/// Process-wide identity allocator, lookup table and execution dispatcher
/// for actions and parameters.
pub struct ActionRegistry {
    actions: RwLock<HashMap<ActionId, Arc<ActionCell>>>,
    parameters: RwLock<HashMap<ParamId, ParamSlot>>,
    buckets: Mutex<Buckets>,
    pub(crate) pool: WorkerPool,
    pub(crate) gateway: Arc<dyn DeviceGateway>,
    pub(crate) publisher: Arc<dyn ChangePublisher>,
    pub(crate) config: EngineConfig,
}

impl ActionRegistry {
    /// Create a registry with its worker pool and the delay template.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned.
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn DeviceGateway>,
        publisher: Arc<dyn ChangePublisher>,
    ) -> std::io::Result<Self> {
        let registry = Self {
            actions: RwLock::new(HashMap::new()),
            parameters: RwLock::new(HashMap::new()),
            buckets: Mutex::new(Buckets::default()),
            pool: WorkerPool::new(config.workers)?,
            gateway,
            publisher,
            config,
        };
        let seconds = registry.new_param_id();
        registry.register_parameter(
            delay_seconds_template(0).duplicate(seconds, ParamOwner::Action(ActionId::DELAY_TYPE)),
        );
        registry.add_action(Action::delay_type(seconds));
        tracing::debug!(workers = config.workers, "action registry ready");
        Ok(registry)
    }

    fn action_table(&self) -> RwLockReadGuard<'_, HashMap<ActionId, Arc<ActionCell>>> {
        self.actions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn action_table_mut(&self) -> RwLockWriteGuard<'_, HashMap<ActionId, Arc<ActionCell>>> {
        self.actions.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn param_table(&self) -> RwLockReadGuard<'_, HashMap<ParamId, ParamSlot>> {
        self.parameters.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn param_table_mut(&self) -> RwLockWriteGuard<'_, HashMap<ParamId, ParamSlot>> {
        self.parameters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn buckets(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Identity ─────────────────────────────────────────────────────

    /// Allocate an action id: non-zero, never [`ActionId::DELAY_TYPE`],
    /// not registered.
    #[must_use]
    pub fn new_action_id(&self) -> ActionId {
        let table = self.action_table();
        loop {
            let id = ActionId::random();
            if id.is_allocatable() && !table.contains_key(&id) {
                return id;
            }
        }
    }

    /// Allocate a non-zero, unregistered parameter id.
    #[must_use]
    pub fn new_param_id(&self) -> ParamId {
        let table = self.param_table();
        loop {
            let id = ParamId::random();
            if !table.contains_key(&id) {
                return id;
            }
        }
    }

    // ── By-id tables ─────────────────────────────────────────────────

    /// Insert into the by-id action table without placing it in a bucket.
    pub fn register_action(&self, action: Action) -> bool {
        let id = action.id();
        if id.is_zero() {
            tracing::warn!(action = %action.name, "refusing to register action without identifier");
            return false;
        }
        let mut table = self.action_table_mut();
        if table.contains_key(&id) {
            tracing::warn!(%id, "action already registered");
            return false;
        }
        table.insert(id, Arc::new(ActionCell::new(action)));
        true
    }

    pub fn unregister_action(&self, id: ActionId) -> bool {
        if self.action_table_mut().remove(&id).is_none() {
            tracing::warn!(%id, "unregistering unknown action");
            return false;
        }
        true
    }

    pub fn register_parameter(&self, parameter: ActionParameter) -> bool {
        let id = parameter.id();
        if id.is_zero() {
            tracing::warn!(parameter = parameter.name(), "refusing to register parameter without identifier");
            return false;
        }
        let mut table = self.param_table_mut();
        if table.contains_key(&id) {
            tracing::warn!(%id, "parameter already registered");
            return false;
        }
        table.insert(id, Arc::new(Mutex::new(parameter)));
        true
    }

    pub fn unregister_parameter(&self, id: ParamId) -> bool {
        if self.param_table_mut().remove(&id).is_none() {
            tracing::warn!(%id, "unregistering unknown parameter");
            return false;
        }
        true
    }

    /// Drop parameters that may already be gone, without warnings.
    pub(crate) fn forget_parameters(&self, ids: &[ParamId]) {
        let mut table = self.param_table_mut();
        for id in ids {
            table.remove(id);
        }
    }

    pub(crate) fn cell(&self, id: ActionId) -> Option<Arc<ActionCell>> {
        self.action_table().get(&id).cloned()
    }

    fn param_slot(&self, id: ParamId) -> Option<ParamSlot> {
        self.param_table().get(&id).cloned()
    }

    /// Mutate a registered parameter in place.
    pub(crate) fn update_parameter<T>(
        &self,
        id: ParamId,
        f: impl FnOnce(&mut ActionParameter) -> T,
    ) -> Option<T> {
        let slot = self.param_slot(id)?;
        let mut parameter = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(f(&mut parameter))
    }

    /// Snapshot of a registered action.
    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<Action> {
        self.cell(id).map(|cell| cell.snapshot())
    }

    /// Snapshot of a registered parameter.
    #[must_use]
    pub fn parameter(&self, id: ParamId) -> Option<ActionParameter> {
        let slot = self.param_slot(id)?;
        let parameter = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(parameter.clone())
    }

    #[must_use]
    pub fn is_running(&self, id: ActionId) -> bool {
        self.cell(id).is_some_and(|cell| cell.is_running())
    }

    // ── Buckets ──────────────────────────────────────────────────────

    /// Register an action and place it in the bucket its kind selects.
    pub fn add_action(&self, action: Action) -> bool {
        let id = action.id();
        let placed = action.clone();
        if !self.register_action(action) {
            return false;
        }
        self.buckets().place(&placed);
        self.publisher.publish(Change::ActionAdded { action: id });
        true
    }

    /// Remove an action with its parameters (own and item) and the delays it
    /// privately owns. Returns `false` if the action was not tracked.
    pub fn remove_action(&self, id: ActionId) -> bool {
        if id == ActionId::DELAY_TYPE {
            tracing::warn!("the delay template cannot be removed");
            return false;
        }
        let Some(cell) = self.cell(id) else {
            tracing::warn!(%id, "removing unknown action");
            return false;
        };
        let action = cell.snapshot();
        for owned in action.owned_actions() {
            self.remove_action(owned);
        }
        self.forget_parameters(&action.all_parameters());
        self.buckets().remove(&action);
        self.action_table_mut().remove(&id);
        tracing::debug!(%action, "action removed");
        self.publisher.publish(Change::ActionRemoved { action: id });
        true
    }

    fn snapshots(&self, ids: &[ActionId]) -> Vec<Action> {
        ids.iter().filter_map(|id| self.action(*id)).collect()
    }

    /// Sequences, in creation order.
    #[must_use]
    pub fn user_actions(&self) -> Vec<Action> {
        let ids = self.buckets().user().to_vec();
        self.snapshots(&ids)
    }

    /// Delays, the delay template first.
    #[must_use]
    pub fn system_actions(&self) -> Vec<Action> {
        let ids = self.buckets().system().to_vec();
        self.snapshots(&ids)
    }

    /// Generated actions of one device.
    #[must_use]
    pub fn device_actions(&self, device: DeviceId) -> Vec<Action> {
        let ids = self.buckets().device(device).to_vec();
        self.snapshots(&ids)
    }

    /// Every registered action except the delay template.
    #[must_use]
    pub fn all_actions(&self) -> Vec<Action> {
        let cells: Vec<_> = self.action_table().values().cloned().collect();
        cells
            .iter()
            .filter(|cell| cell.id() != ActionId::DELAY_TYPE)
            .map(|cell| cell.snapshot())
            .collect()
    }

    /// Every registered parameter except the delay template's.
    #[must_use]
    pub fn all_parameters(&self) -> Vec<ActionParameter> {
        let slots: Vec<_> = self.param_table().values().cloned().collect();
        slots
            .iter()
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .filter(|p| p.param.owner != Some(ParamOwner::Action(ActionId::DELAY_TYPE)))
            .collect()
    }

    /// Smallest free variant of `base` among named actions: `base`, then
    /// `"base 1"`, `"base 2"`, …
    #[must_use]
    pub fn generate_unique_name(&self, base: &str) -> String {
        let cells: Vec<_> = self.action_table().values().cloned().collect();
        let taken: HashSet<String> = cells
            .iter()
            .filter(|cell| cell.kind() != ActionKind::Event)
            .map(|cell| cell.name())
            .collect();
        if !taken.contains(base) {
            return base.to_string();
        }
        let mut suffix = 1_u64;
        loop {
            let candidate = format!("{base} {suffix}");
            if !taken.contains(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    // ── Resolution ───────────────────────────────────────────────────

    /// Current value of a parameter, following dependencies.
    #[must_use]
    pub fn resolve_value(&self, id: ParamId) -> Option<Value> {
        self.parameter(id)?.current_value(self)
    }

    /// Qualified display name of a parameter.
    #[must_use]
    pub fn full_name(&self, id: ParamId) -> Option<String> {
        self.parameter(id).map(|p| p.param.full_name(self))
    }

    /// Parameters a caller binds when using `action`: own INPUT and CONSTANT
    /// parameters, plus INPUT item parameters of a sequence.
    #[must_use]
    pub fn exposed_parameters(&self, action: &Action) -> Vec<ParamId> {
        let role = |id: &ParamId| self.parameter(*id).map(|p| p.role());
        let mut exposed: Vec<ParamId> = action
            .parameters
            .iter()
            .filter(|id| matches!(role(id), Some(ParamRole::Input | ParamRole::Constant)))
            .copied()
            .collect();
        for item in action.items() {
            exposed.extend(
                item.parameters
                    .iter()
                    .filter(|id| role(id) == Some(ParamRole::Input))
                    .copied(),
            );
        }
        exposed
    }

    pub(crate) fn publish_parameters_changed(&self, owner: Option<ParamOwner>) {
        if let Some(ParamOwner::Action(action)) = owner {
            self.publisher.publish(Change::ParametersChanged { action });
        }
    }
}

impl ParameterResolver for ActionRegistry {
    fn parameter(&self, id: ParamId) -> Option<ActionParameter> {
        Self::parameter(self, id)
    }

    fn action_name(&self, id: ActionId) -> Option<String> {
        self.cell(id).map(|cell| cell.name())
    }
}

pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> NotFoundError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
}
