//! Non-reentrant lock with a bounded wait.
//!
//! Unlike [`std::sync::Mutex`] this lock guards no data: it serializes
//! executions of one action or firings of one event, and gives up after a
//! timeout instead of blocking indefinitely.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// A held [`InstanceLock`]; released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct InstanceGuard<'a> {
    lock: &'a InstanceLock,
}

impl Drop for InstanceGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .lock
            .held
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *held = false;
        drop(held);
        self.lock.released.notify_one();
    }
}

#[derive(Debug, Default)]
pub struct InstanceLock {
    held: Mutex<bool>,
    released: Condvar,
}

impl InstanceLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, waiting at most `timeout`. Taking it again from the
    /// same thread waits like any other contender.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<InstanceGuard<'_>> {
        let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut held, result) = self
            .released
            .wait_timeout_while(held, timeout, |held| *held)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && *held {
            return None;
        }
        *held = true;
        Some(InstanceGuard { lock: self })
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        *self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
