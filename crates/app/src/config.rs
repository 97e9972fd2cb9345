//! Tunables of the engine services.

use std::time::Duration;

/// Action registry and execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads available to `execute_threaded`.
    pub workers: usize,
    /// Longest wait for an action's or device's instance lock.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            lock_timeout: Duration::from_secs(1),
        }
    }
}

/// Event scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Period of the heartbeat that evaluates date-time triggers.
    pub heartbeat: Duration,
    /// Longest wait for an event's instance lock while firing.
    pub lock_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(60),
            lock_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_five_workers_and_one_second_lock() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, 5);
        assert_eq!(config.lock_timeout, Duration::from_secs(1));
    }

    #[test]
    fn should_default_to_minute_heartbeat() {
        assert_eq!(SchedulerConfig::default().heartbeat, Duration::from_secs(60));
    }
}
