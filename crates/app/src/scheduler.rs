//! Event scheduler: decides when events fire.
//!
//! One dedicated thread waits on a [`SignalBank`] for the first of five
//! wake-up reasons. A heartbeat evaluates the date-time triggers of enabled
//! events (and the screen triggers) against the tick time; a message, a
//! status change, an edit of the event list, or a date-time trigger that
//! just fired causes a scan that fires every ready event in insertion order.
//!
//! Firing an event resets its trigger latches under the event's instance
//! lock, then dispatches every event action whose guards pass onto the
//! registry's worker pool.
//!
//! Events and triggers share one identifier namespace, separate from the
//! registry's.

mod signals;

pub use signals::{SignalBank, Wake};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use synhub_domain::action::Conditional;
use synhub_domain::change::Change;
use synhub_domain::device::{DeviceDescriptor, DeviceFunction, DeviceMessage, LinkStatus, StatusChange};
use synhub_domain::error::{SynhubError, ValidationError};
use synhub_domain::event::{Event, TriggerMode};
use synhub_domain::id::{ActionId, EventId, ParamId, TriggerId, random_nonzero};
use synhub_domain::parameter::{ActionParameter, ParamOwner, ParamRole, Parameter};
use synhub_domain::time::{self, Timestamp};
use synhub_domain::trigger::{DateTimeSchedule, Trigger, TriggerKind};

use crate::config::SchedulerConfig;
use crate::instance_lock::InstanceLock;
use crate::ports::ChangePublisher;
use crate::registry::{ActionRegistry, not_found};

struct EventSlot {
    event: Event,
    lock: Arc<InstanceLock>,
}

#[derive(Default)]
struct SchedulerState {
    events: Vec<EventSlot>,
    screen_triggers: Vec<Trigger>,
    ids: HashSet<u64>,
}

impl SchedulerState {
    fn slot_mut(&mut self, id: EventId) -> Option<&mut EventSlot> {
        self.events.iter_mut().find(|slot| slot.event.id() == id)
    }

    fn all_triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.screen_triggers
            .iter()
            .chain(self.events.iter().flat_map(|slot| slot.event.triggers()))
    }

    fn find_trigger(&self, id: TriggerId) -> Option<&Trigger> {
        self.all_triggers().find(|t| t.id() == id)
    }

    fn allocate(&mut self) -> u64 {
        loop {
            let raw = random_nonzero();
            if self.ids.insert(raw) {
                return raw;
            }
        }
    }
}

/// Coordinator of events, triggers and the scheduling thread.
pub struct EventScheduler {
    registry: Arc<ActionRegistry>,
    publisher: Arc<dyn ChangePublisher>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    signals: SignalBank,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EventScheduler {
    /// Create an idle scheduler. Call [`spawn`](Self::spawn) to start its thread.
    pub fn new(
        registry: Arc<ActionRegistry>,
        publisher: Arc<dyn ChangePublisher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            publisher,
            config,
            state: Mutex::new(SchedulerState::default()),
            signals: SignalBank::new(),
            thread: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Thread ───────────────────────────────────────────────────────

    /// Start the `event-scheduler` thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<()> {
        let scheduler = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("event-scheduler".to_string())
            .spawn(move || scheduler.run())?;
        *self.thread.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        tracing::info!(heartbeat = ?self.config.heartbeat, "event scheduler started");
        Ok(())
    }

    fn run(&self) {
        let mut next_heartbeat = Instant::now() + self.config.heartbeat;
        loop {
            match self.signals.wait_until(next_heartbeat) {
                Wake::Shutdown => break,
                Wake::Heartbeat => {
                    next_heartbeat = Instant::now() + self.config.heartbeat;
                    self.tick(time::now());
                }
                wake => {
                    tracing::debug!(?wake, "scheduler woke");
                    self.fire_ready_events();
                }
            }
        }
        tracing::info!("event scheduler stopped");
    }

    /// Stop the thread after its current pass and wait for it. Running
    /// actions are not interrupted.
    pub fn shutdown(&self) {
        self.signals.raise(Wake::Shutdown);
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.thread().id() != thread::current().id()
            && handle.join().is_err()
        {
            tracing::error!("event scheduler thread panicked");
        }
    }

    // ── Identity ─────────────────────────────────────────────────────

    #[must_use]
    pub fn new_event_id(&self) -> EventId {
        EventId::from_raw(self.state().allocate())
    }

    #[must_use]
    pub fn new_trigger_id(&self) -> TriggerId {
        TriggerId::from_raw(self.state().allocate())
    }

    fn release_ids(&self, ids: impl IntoIterator<Item = u64>) {
        let mut state = self.state();
        for id in ids {
            state.ids.remove(&id);
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Create an enabled, empty event.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name.
    #[tracing::instrument(skip(self))]
    pub fn create_event(&self, name: &str) -> Result<EventId, SynhubError> {
        let id = self.new_event_id();
        let event = match Event::builder().id(id).name(name).build() {
            Ok(event) => event,
            Err(error) => {
                self.release_ids([id.as_raw()]);
                return Err(error);
            }
        };
        self.state().events.push(EventSlot {
            event,
            lock: Arc::new(InstanceLock::new()),
        });
        self.events_changed();
        Ok(id)
    }

    /// Remove an event with its triggers' parameters and its event actions.
    #[tracing::instrument(skip(self))]
    pub fn remove_event(&self, id: EventId) -> bool {
        let removed = {
            let mut state = self.state();
            let index = state.events.iter().position(|slot| slot.event.id() == id);
            index.map(|index| state.events.remove(index))
        };
        let Some(slot) = removed else {
            tracing::warn!(%id, "removing unknown event");
            return false;
        };
        let mut ids = vec![id.as_raw()];
        for trigger in slot.event.triggers() {
            self.registry.forget_parameters(&trigger.parameters);
            ids.push(trigger.id().as_raw());
        }
        self.release_ids(ids);
        for action in slot.event.actions() {
            self.registry.remove_action(*action);
        }
        self.events_changed();
        true
    }

    /// Copy a known trigger (screen or event) into an event, with a new
    /// trigger id and new parameter ids.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] if the event or trigger is unknown.
    #[tracing::instrument(skip(self))]
    pub fn add_trigger_to_event(
        &self,
        event: EventId,
        source: TriggerId,
    ) -> Result<TriggerId, SynhubError> {
        let original = {
            let state = self.state();
            if !state.events.iter().any(|slot| slot.event.id() == event) {
                return Err(not_found("Event", event).into());
            }
            state
                .find_trigger(source)
                .cloned()
                .ok_or_else(|| not_found("Trigger", source))?
        };
        let mut copy = original.copy_unregistered();
        let id = self.new_trigger_id();
        copy.assign_id(id)?;
        let owner = ParamOwner::Trigger(id);
        for parameter in &original.parameters {
            if let Some(parameter) = self.registry.parameter(*parameter) {
                let param_id = self.registry.new_param_id();
                self.registry
                    .register_parameter(parameter.duplicate(param_id, owner));
                copy.parameters.push(param_id);
            }
        }

        let leftover = {
            let mut state = self.state();
            match state.slot_mut(event) {
                Some(slot) => {
                    slot.event.push_trigger(copy);
                    None
                }
                None => Some(copy),
            }
        };
        if let Some(copy) = leftover {
            self.registry.forget_parameters(&copy.parameters);
            self.release_ids([id.as_raw()]);
            return Err(not_found("Event", event).into());
        }
        self.publisher.publish(Change::TriggersChanged {
            event: Some(event),
            trigger: Some(id),
        });
        self.events_changed();
        Ok(id)
    }

    /// Remove one trigger from an event, releasing its parameters.
    pub fn remove_trigger_from_event(&self, event: EventId, trigger: TriggerId) -> bool {
        let taken = self
            .state()
            .slot_mut(event)
            .and_then(|slot| slot.event.take_trigger(trigger));
        let Some(taken) = taken else {
            tracing::warn!(%event, %trigger, "removing unknown trigger");
            return false;
        };
        self.registry.forget_parameters(&taken.parameters);
        self.release_ids([trigger.as_raw()]);
        self.publisher.publish(Change::TriggersChanged {
            event: Some(event),
            trigger: Some(trigger),
        });
        self.events_changed();
        true
    }

    /// Bind `target` to an event through a new event action.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for an unknown event or target.
    #[tracing::instrument(skip(self))]
    pub fn add_action_to_event(
        &self,
        event: EventId,
        target: ActionId,
    ) -> Result<ActionId, SynhubError> {
        if self.event(event).is_none() {
            return Err(not_found("Event", event).into());
        }
        let binding = self.registry.create_event_action(target)?;
        let added = self
            .state()
            .slot_mut(event)
            .map(|slot| slot.event.push_action(binding))
            .is_some();
        if !added {
            self.registry.remove_action(binding);
            return Err(not_found("Event", event).into());
        }
        self.events_changed();
        Ok(binding)
    }

    /// Remove an event action from its event and from the registry.
    pub fn remove_action_from_event(&self, event: EventId, action: ActionId) -> bool {
        let removed = self
            .state()
            .slot_mut(event)
            .is_some_and(|slot| slot.event.remove_action(action));
        if !removed {
            tracing::warn!(%event, %action, "removing unknown event action");
            return false;
        }
        self.registry.remove_action(action);
        self.events_changed();
        true
    }

    /// Guard an event action with a conditional.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] if `action` is not one of the
    /// event's actions or the guarded parameter does not exist.
    pub fn add_conditional(
        &self,
        event: EventId,
        action: ActionId,
        conditional: Conditional,
    ) -> Result<(), SynhubError> {
        let owned = self
            .event(event)
            .is_some_and(|e| e.actions().contains(&action));
        if !owned {
            return Err(not_found("EventAction", action).into());
        }
        self.registry.add_conditional(action, conditional)
    }

    /// Enable or disable an event; its triggers listen only while enabled.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for an unknown event.
    pub fn set_event_enabled(&self, event: EventId, enabled: bool) -> Result<(), SynhubError> {
        self.state()
            .slot_mut(event)
            .map(|slot| slot.event.set_enabled(enabled))
            .ok_or_else(|| not_found("Event", event))?;
        self.events_changed();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] for an unknown event.
    pub fn set_event_mode(&self, event: EventId, mode: TriggerMode) -> Result<(), SynhubError> {
        self.state()
            .slot_mut(event)
            .map(|slot| slot.event.mode = mode)
            .ok_or_else(|| not_found("Event", event))?;
        self.events_changed();
        Ok(())
    }

    #[must_use]
    pub fn event(&self, id: EventId) -> Option<Event> {
        self.state()
            .events
            .iter()
            .find(|slot| slot.event.id() == id)
            .map(|slot| slot.event.clone())
    }

    /// Events in insertion order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.state()
            .events
            .iter()
            .map(|slot| slot.event.clone())
            .collect()
    }

    // ── Screen triggers ──────────────────────────────────────────────

    #[must_use]
    pub fn screen_triggers(&self) -> Vec<Trigger> {
        self.state().screen_triggers.clone()
    }

    /// Reconcile the generated triggers of one device: a message trigger per
    /// function with a return value and one status trigger. Returns how many
    /// triggers were created.
    #[tracing::instrument(skip(self, device), fields(device = %device.id))]
    pub fn refresh_screen_triggers(&self, device: &DeviceDescriptor) -> usize {
        let mut wanted: Vec<(String, TriggerKind, Option<&DeviceFunction>)> = device
            .functions
            .iter()
            .filter(|f| f.returns_value())
            .map(|f| {
                (
                    format!("{} {}", device.name, f.name),
                    TriggerKind::Message {
                        device: device.id,
                        function: f.id,
                    },
                    Some(f),
                )
            })
            .collect();
        wanted.push((
            format!("{} offline", device.name),
            TriggerKind::Status {
                device: Some(device.id),
                expect: LinkStatus::Down,
            },
            None,
        ));

        let existing: Vec<Trigger> = self
            .state()
            .screen_triggers
            .iter()
            .filter(|t| t.generated && t.device() == Some(device.id))
            .cloned()
            .collect();
        let stale: Vec<&Trigger> = existing
            .iter()
            .filter(|t| !wanted.iter().any(|(_, kind, _)| *kind == t.kind))
            .collect();

        let mut created = Vec::new();
        for (name, kind, function) in wanted {
            if existing.iter().any(|t| t.kind == kind) {
                continue;
            }
            let mut trigger = Trigger::new(name, kind);
            let id = self.new_trigger_id();
            if trigger.assign_id(id).is_err() {
                continue;
            }
            trigger.generated = true;
            trigger.subscribe();
            if let Some(function) = function {
                trigger.parameters = self.measurement_parameters(id, function);
            }
            created.push(trigger);
        }

        let stale_ids: Vec<TriggerId> = stale.iter().map(|t| t.id()).collect();
        let count = created.len();
        {
            let mut state = self.state();
            state
                .screen_triggers
                .retain(|t| !stale_ids.contains(&t.id()));
            state.screen_triggers.extend(created);
        }
        for trigger in &stale {
            self.registry.forget_parameters(&trigger.parameters);
        }
        self.release_ids(stale_ids.iter().map(|id| id.as_raw()));
        if count > 0 || !stale_ids.is_empty() {
            self.publisher.publish(Change::TriggersChanged {
                event: None,
                trigger: None,
            });
        }
        count
    }

    fn measurement_parameters(&self, trigger: TriggerId, function: &DeviceFunction) -> Vec<ParamId> {
        let built = Parameter::builder()
            .id(self.registry.new_param_id())
            .owner(ParamOwner::Trigger(trigger))
            .name(function.name.clone())
            .data_type(function.return_type)
            .build();
        match built {
            Ok(param) => {
                let id = param.id();
                self.registry
                    .register_parameter(ActionParameter::new(param, ParamRole::Internal));
                vec![id]
            }
            Err(error) => {
                tracing::warn!(function = %function.name, %error, "cannot create measurement parameter");
                Vec::new()
            }
        }
    }

    /// Add a user date-time trigger to the screen triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name.
    pub fn create_date_time_trigger(
        &self,
        name: &str,
        schedule: DateTimeSchedule,
    ) -> Result<TriggerId, SynhubError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let mut trigger = Trigger::new(name, TriggerKind::DateTime(schedule));
        let id = self.new_trigger_id();
        trigger.assign_id(id)?;
        trigger.subscribe();
        self.state().screen_triggers.push(trigger);
        self.publisher.publish(Change::TriggersChanged {
            event: None,
            trigger: Some(id),
        });
        Ok(id)
    }

    /// Remove a screen trigger. Copies already in events are unaffected.
    pub fn remove_screen_trigger(&self, id: TriggerId) -> bool {
        let removed = {
            let mut state = self.state();
            let index = state.screen_triggers.iter().position(|t| t.id() == id);
            index.map(|index| state.screen_triggers.remove(index))
        };
        let Some(trigger) = removed else {
            return false;
        };
        self.registry.forget_parameters(&trigger.parameters);
        self.release_ids([id.as_raw()]);
        self.publisher.publish(Change::TriggersChanged {
            event: None,
            trigger: Some(id),
        });
        true
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Store the returned values in the parameters of every subscribed
    /// message trigger watching `message`, then latch those triggers and
    /// wake the scheduler. A latched trigger always exposes its new values.
    pub fn message_arrived(&self, message: &DeviceMessage) {
        let watching: Vec<Vec<ParamId>> = self
            .state()
            .all_triggers()
            .filter(|trigger| trigger.watches_message(message))
            .map(|trigger| trigger.parameters.clone())
            .collect();
        for parameters in watching {
            for (parameter, value) in parameters.iter().zip(&message.values) {
                if let Err(error) = self.registry.set_internal_value(*parameter, value.clone()) {
                    tracing::warn!(%parameter, %error, "cannot store measured value");
                }
            }
        }
        {
            let mut state = self.state();
            let state = &mut *state;
            let triggers = state
                .events
                .iter_mut()
                .flat_map(|slot| slot.event.triggers_mut().iter_mut())
                .chain(state.screen_triggers.iter_mut());
            for trigger in triggers {
                trigger.observe_message(message);
            }
        }
        self.signals.raise(Wake::MessageArrived);
    }

    /// Latch subscribed status triggers and wake the scheduler.
    pub fn status_changed(&self, change: &StatusChange) {
        {
            let mut state = self.state();
            let state = &mut *state;
            let triggers = state
                .events
                .iter_mut()
                .flat_map(|slot| slot.event.triggers_mut().iter_mut())
                .chain(state.screen_triggers.iter_mut());
            for trigger in triggers {
                trigger.observe_status(change);
            }
        }
        self.signals.raise(Wake::StatusChanged);
    }

    /// Heartbeat pass: evaluate date-time triggers against `now` and, if one
    /// of an enabled event fired, fire every ready event. Returns how many
    /// events fired.
    pub fn tick(&self, now: Timestamp) -> usize {
        let any_fired = {
            let mut state = self.state();
            let state = &mut *state;
            let mut any_fired = false;
            for slot in state.events.iter_mut().filter(|s| s.event.is_enabled()) {
                for trigger in slot.event.triggers_mut() {
                    any_fired |= trigger.evaluate_time(now);
                }
            }
            for trigger in &mut state.screen_triggers {
                trigger.evaluate_time(now);
            }
            any_fired
        };
        if any_fired {
            self.fire_ready_events()
        } else {
            0
        }
    }

    /// Scan every event in insertion order and fire the ready ones. Returns
    /// how many events fired.
    pub fn fire_ready_events(&self) -> usize {
        let ready: Vec<EventId> = self
            .state()
            .events
            .iter()
            .filter(|slot| slot.event.ready_to_execute())
            .map(|slot| slot.event.id())
            .collect();
        ready.into_iter().filter(|id| self.fire_event(*id)).count()
    }

    /// Fire one event: under its instance lock, reset the trigger latches and
    /// dispatch every event action whose conditionals pass. Returns `false`
    /// when the event is unknown, not ready, or already firing.
    pub fn fire_event(&self, id: EventId) -> bool {
        let Some(lock) = self
            .state()
            .events
            .iter()
            .find(|slot| slot.event.id() == id)
            .map(|slot| Arc::clone(&slot.lock))
        else {
            return false;
        };
        let Some(_guard) = lock.try_lock_for(self.config.lock_timeout) else {
            tracing::debug!(event = %id, "event already firing");
            return false;
        };
        let actions = {
            let mut state = self.state();
            let Some(slot) = state.slot_mut(id) else {
                return false;
            };
            if !slot.event.ready_to_execute() {
                return false;
            }
            slot.event.reset_triggers();
            slot.event.actions().to_vec()
        };
        tracing::debug!(event = %id, actions = actions.len(), "event fired");
        for action in actions {
            if !self.registry.conditionals_pass(action) {
                tracing::debug!(event = %id, %action, "guard failed");
                continue;
            }
            if !self.registry.execute_threaded(action) {
                tracing::warn!(event = %id, %action, "event action not dispatched");
            }
        }
        true
    }

    fn events_changed(&self) {
        self.publisher.publish(Change::EventsChanged);
        self.signals.raise(Wake::EventsChanged);
    }

    // ── Load pipeline ────────────────────────────────────────────────

    fn claim(state: &mut SchedulerState, ids: &[u64]) -> bool {
        let unique: HashSet<_> = ids.iter().collect();
        if unique.len() != ids.len() || ids.iter().any(|id| *id == 0 || state.ids.contains(id)) {
            return false;
        }
        state.ids.extend(ids);
        true
    }

    /// Adopt a loaded event as-is. Fails when the event or one of its
    /// triggers has an invalid or already used id.
    pub fn register_event(&self, event: Event) -> bool {
        let mut ids = vec![event.id().as_raw()];
        ids.extend(event.triggers().iter().map(|t| t.id().as_raw()));
        let mut state = self.state();
        if !Self::claim(&mut state, &ids) {
            tracing::warn!(event = %event.id(), "skipping event with invalid identifiers");
            return false;
        }
        state.events.push(EventSlot {
            event,
            lock: Arc::new(InstanceLock::new()),
        });
        true
    }

    /// Adopt a loaded screen trigger as-is.
    pub fn register_screen_trigger(&self, trigger: Trigger) -> bool {
        let mut state = self.state();
        if !Self::claim(&mut state, &[trigger.id().as_raw()]) {
            tracing::warn!(trigger = %trigger.id(), "skipping trigger with invalid identifier");
            return false;
        }
        state.screen_triggers.push(trigger);
        true
    }

    /// Subscribe the triggers of enabled events and every screen trigger.
    pub fn rebuild_subscriptions(&self) {
        let mut state = self.state();
        for slot in &mut state.events {
            slot.event.sync_subscriptions();
        }
        for trigger in &mut state.screen_triggers {
            trigger.subscribe();
        }
    }

    pub fn refresh_completeness(&self) {
        for slot in &mut self.state().events {
            slot.event.refresh_completeness();
        }
    }

    /// Announce that the event list changed and wake the scheduler.
    pub fn notify_events_changed(&self) {
        self.events_changed();
    }
}
