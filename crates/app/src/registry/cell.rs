//! A registered action together with its runtime state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use synhub_domain::action::{Action, ActionKind};
use synhub_domain::id::ActionId;

use crate::instance_lock::{InstanceGuard, InstanceLock};

/// An action slot in the registry's by-id table.
///
/// The action data sits behind its own mutex; `running` and the instance
/// lock are runtime-only and never persisted.
#[derive(Debug)]
pub struct ActionCell {
    id: ActionId,
    kind: ActionKind,
    action: Mutex<Action>,
    running: AtomicBool,
    lock: InstanceLock,
}

impl ActionCell {
    pub(crate) fn new(action: Action) -> Self {
        Self {
            id: action.id(),
            kind: action.kind(),
            action: Mutex::new(action),
            running: AtomicBool::new(false),
            lock: InstanceLock::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ActionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Copy of the current action data.
    #[must_use]
    pub fn snapshot(&self) -> Action {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.action
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .name
            .clone()
    }

    pub(crate) fn update<T>(&self, f: impl FnOnce(&mut Action) -> T) -> T {
        let mut action = self.action.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut action)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Idle → Running. Fails if already running.
    pub(crate) fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Running → Idle.
    pub(crate) fn finish(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Take the per-action instance lock, waiting at most `timeout`.
    pub fn try_lock(&self, timeout: Duration) -> Option<InstanceGuard<'_>> {
        self.lock.try_lock_for(timeout)
    }
}
