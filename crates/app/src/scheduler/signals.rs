//! Wake-up signals of the scheduler thread.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Instant;

/// Why the scheduler thread woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wake {
    Shutdown,
    Heartbeat,
    MessageArrived,
    StatusChanged,
    EventsChanged,
}

#[derive(Debug, Default)]
struct Pending {
    shutdown: bool,
    message: bool,
    status: bool,
    events: bool,
}

impl Pending {
    /// Take the first raised input signal, clearing it. Shutdown is not an
    /// input: it stays raised so every later wait returns at once.
    fn take(&mut self) -> Option<Wake> {
        if std::mem::take(&mut self.message) {
            return Some(Wake::MessageArrived);
        }
        if std::mem::take(&mut self.status) {
            return Some(Wake::StatusChanged);
        }
        if std::mem::take(&mut self.events) {
            return Some(Wake::EventsChanged);
        }
        None
    }
}

/// A set of level-triggered signals a single thread waits on.
#[derive(Debug, Default)]
pub struct SignalBank {
    pending: Mutex<Pending>,
    raised: Condvar,
}

impl SignalBank {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a signal. Raising [`Wake::Heartbeat`] is a no-op: heartbeats
    /// come from the wait deadline.
    pub fn raise(&self, wake: Wake) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        match wake {
            Wake::Shutdown => pending.shutdown = true,
            Wake::MessageArrived => pending.message = true,
            Wake::StatusChanged => pending.status = true,
            Wake::EventsChanged => pending.events = true,
            Wake::Heartbeat => return,
        }
        drop(pending);
        self.raised.notify_all();
    }

    /// Block until a signal is raised or `deadline` passes, whichever comes
    /// first; the taken signal is cleared. A passed deadline is a heartbeat
    /// and wins over pending inputs, so a busy input stream cannot starve it.
    pub fn wait_until(&self, deadline: Instant) -> Wake {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if pending.shutdown {
                return Wake::Shutdown;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Heartbeat;
            }
            if let Some(wake) = pending.take() {
                return wake;
            }
            pending = self
                .raised
                .wait_timeout(pending, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn should_report_heartbeat_when_deadline_passes() {
        let bank = SignalBank::new();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(bank.wait_until(deadline), Wake::Heartbeat);
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn should_clear_signal_when_taken() {
        let bank = SignalBank::new();
        bank.raise(Wake::MessageArrived);
        let soon = Instant::now() + Duration::from_millis(10);
        assert_eq!(bank.wait_until(soon), Wake::MessageArrived);
        assert_eq!(bank.wait_until(soon), Wake::Heartbeat);
    }

    #[test]
    fn should_prefer_shutdown_and_keep_it_raised() {
        let bank = SignalBank::new();
        bank.raise(Wake::EventsChanged);
        bank.raise(Wake::Shutdown);
        let soon = Instant::now() + Duration::from_millis(10);
        assert_eq!(bank.wait_until(soon), Wake::Shutdown);
        assert_eq!(bank.wait_until(soon), Wake::Shutdown);
    }

    #[test]
    fn should_report_passed_deadline_before_pending_input() {
        let bank = SignalBank::new();
        bank.raise(Wake::MessageArrived);
        let passed = Instant::now();
        assert_eq!(bank.wait_until(passed), Wake::Heartbeat);
        let soon = Instant::now() + Duration::from_millis(10);
        assert_eq!(bank.wait_until(soon), Wake::MessageArrived);
    }

    #[test]
    fn should_keep_heartbeat_under_constant_input() {
        let bank = Arc::new(SignalBank::new());
        let stop = Arc::new(AtomicBool::new(false));
        let raiser = {
            let bank = Arc::clone(&bank);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    bank.raise(Wake::MessageArrived);
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        let heartbeat = Duration::from_millis(50);
        let started = Instant::now();
        let mut deadline = started + heartbeat;
        let mut beats = 0;
        while started.elapsed() < Duration::from_secs(1) {
            if bank.wait_until(deadline) == Wake::Heartbeat {
                beats += 1;
                deadline = Instant::now() + heartbeat;
            }
            thread::sleep(Duration::from_millis(1));
        }
        stop.store(true, Ordering::Relaxed);
        raiser.join().unwrap();
        assert!(beats >= 10, "only {beats} heartbeats in one second");
    }

    #[test]
    fn should_wake_waiting_thread() {
        let bank = Arc::new(SignalBank::new());
        let waiter = {
            let bank = Arc::clone(&bank);
            thread::spawn(move || bank.wait_until(Instant::now() + Duration::from_secs(30)))
        };
        thread::sleep(Duration::from_millis(20));
        bank.raise(Wake::StatusChanged);
        assert_eq!(waiter.join().unwrap(), Wake::StatusChanged);
    }
}
