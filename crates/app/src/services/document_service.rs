//! Document service: the load pipeline and live snapshots.
//!
//! Loading runs a fixed order so that every weak reference (by id) can be
//! resolved once the step that needs it runs:
//!
//! 1. validate identity, skipping offenders with a warning
//! 2. register parameters
//! 3. register actions and place them in buckets
//! 4. register events and screen triggers in the scheduler's id space
//! 5. rebuild trigger subscriptions of enabled events
//! 6. recompute event completeness
//! 7. signal that the event list changed

use std::collections::HashSet;
use std::sync::Arc;

use synhub_domain::action::Action;
use synhub_domain::document::Document;
use synhub_domain::error::{IdentityError, SynhubError};
use synhub_domain::id::ActionId;
use synhub_domain::parameter::{ActionParameter, ParamOwner};

use crate::ports::DocumentStore;
use crate::registry::ActionRegistry;
use crate::scheduler::EventScheduler;

/// What a load adopted and what it skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub parameters: usize,
    pub actions: usize,
    pub events: usize,
    pub screen_triggers: usize,
    pub skipped: usize,
}

/// Persists and restores the engine's object graph.
pub struct DocumentService<S> {
    store: S,
    registry: Arc<ActionRegistry>,
    scheduler: Arc<EventScheduler>,
}

/// Admit a raw id once per namespace.
fn admit(seen: &mut HashSet<u64>, raw: u64) -> Result<(), IdentityError> {
    if raw == 0 {
        return Err(IdentityError::Zero);
    }
    if !seen.insert(raw) {
        return Err(IdentityError::Duplicate(raw));
    }
    Ok(())
}

fn admit_parameter(seen: &mut HashSet<u64>, parameter: &ActionParameter) -> Result<(), IdentityError> {
    if parameter.param.owner == Some(ParamOwner::Action(ActionId::DELAY_TYPE)) {
        return Err(IdentityError::Reserved(parameter.id().as_raw()));
    }
    admit(seen, parameter.id().as_raw())
}

fn admit_action(seen: &mut HashSet<u64>, action: &Action) -> Result<(), IdentityError> {
    if action.id() == ActionId::DELAY_TYPE {
        return Err(IdentityError::Reserved(action.id().as_raw()));
    }
    admit(seen, action.id().as_raw())
}

impl<S: DocumentStore> DocumentService<S> {
    pub fn new(store: S, registry: Arc<ActionRegistry>, scheduler: Arc<EventScheduler>) -> Self {
        Self {
            store,
            registry,
            scheduler,
        }
    }

    /// Read the stored document and apply it. An empty store loads nothing.
    ///
    /// # Errors
    ///
    /// Returns the storage error of the backing store.
    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> Result<LoadReport, SynhubError> {
        let Some(document) = self.store.load()? else {
            tracing::info!("no stored document");
            return Ok(LoadReport::default());
        };
        Ok(self.apply(document))
    }

    /// Run the load pipeline over `document`.
    pub fn apply(&self, document: Document) -> LoadReport {
        let mut report = LoadReport::default();

        let mut seen = HashSet::new();
        let parameters: Vec<ActionParameter> = document
            .parameters
            .into_iter()
            .filter(|p| match admit_parameter(&mut seen, p) {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(parameter = p.name(), %error, "skipping parameter");
                    report.skipped += 1;
                    false
                }
            })
            .collect();
        let mut seen = HashSet::new();
        let actions: Vec<Action> = document
            .actions
            .into_iter()
            .filter(|a| match admit_action(&mut seen, a) {
                Ok(()) => true,
                Err(error) => {
                    tracing::warn!(action = %a.name, %error, "skipping action");
                    report.skipped += 1;
                    false
                }
            })
            .collect();

        for parameter in parameters {
            if self.registry.register_parameter(parameter) {
                report.parameters += 1;
            } else {
                report.skipped += 1;
            }
        }
        for action in actions {
            if self.registry.add_action(action) {
                report.actions += 1;
            } else {
                report.skipped += 1;
            }
        }
        for event in document.events {
            if self.scheduler.register_event(event) {
                report.events += 1;
            } else {
                report.skipped += 1;
            }
        }
        for trigger in document.screen_triggers {
            if self.scheduler.register_screen_trigger(trigger) {
                report.screen_triggers += 1;
            } else {
                report.skipped += 1;
            }
        }

        self.scheduler.rebuild_subscriptions();
        self.scheduler.refresh_completeness();
        self.scheduler.notify_events_changed();
        tracing::info!(?report, "document loaded");
        report
    }

    /// Build a document from live state. Delays and sequences keep their
    /// listing order; everything else follows in id order.
    #[must_use]
    pub fn snapshot(&self) -> Document {
        let mut actions: Vec<Action> = self
            .registry
            .system_actions()
            .into_iter()
            .chain(self.registry.user_actions())
            .filter(|a| a.id() != ActionId::DELAY_TYPE)
            .collect();
        let listed: HashSet<ActionId> = actions.iter().map(Action::id).collect();
        let mut rest: Vec<Action> = self
            .registry
            .all_actions()
            .into_iter()
            .filter(|a| !listed.contains(&a.id()))
            .collect();
        rest.sort_by_key(Action::id);
        actions.extend(rest);

        let mut parameters = self.registry.all_parameters();
        parameters.sort_by_key(ActionParameter::id);

        Document {
            actions,
            parameters,
            events: self.scheduler.events(),
            screen_triggers: self.scheduler.screen_triggers(),
        }
    }

    /// Snapshot the live state into the store.
    ///
    /// # Errors
    ///
    /// Returns the storage error of the backing store.
    #[tracing::instrument(skip(self))]
    pub fn save(&self) -> Result<(), SynhubError> {
        let document = self.snapshot();
        self.store.save(&document)?;
        tracing::info!(
            actions = document.actions.len(),
            events = document.events.len(),
            "document saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::test_support::{LAMP, READ_LEVEL, RecordingGateway, SET_LEVEL, lamp, registry};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use synhub_domain::action::ActionBody;
    use synhub_domain::device::DeviceMessage;
    use synhub_domain::trigger::TriggerKind;
    use synhub_domain::value::Value;

    #[derive(Default)]
    struct InMemoryStore {
        document: Mutex<Option<Document>>,
    }

    impl DocumentStore for InMemoryStore {
        fn load(&self) -> Result<Option<Document>, SynhubError> {
            Ok(self.document.lock().unwrap().clone())
        }

        fn save(&self, document: &Document) -> Result<(), SynhubError> {
            *self.document.lock().unwrap() = Some(document.clone());
            Ok(())
        }
    }

    struct Engine {
        registry: Arc<ActionRegistry>,
        gateway: Arc<RecordingGateway>,
        scheduler: Arc<EventScheduler>,
    }

    fn engine() -> Engine {
        let (registry, gateway, bus) = registry(2);
        let scheduler = Arc::new(EventScheduler::new(
            Arc::clone(&registry),
            bus,
            SchedulerConfig::default(),
        ));
        Engine {
            registry,
            gateway,
            scheduler,
        }
    }

    fn service(engine: &Engine, store: Arc<InMemoryStore>) -> DocumentService<Arc<InMemoryStore>> {
        DocumentService::new(
            store,
            Arc::clone(&engine.registry),
            Arc::clone(&engine.scheduler),
        )
    }

    /// Lamp actions, a sequence with an owned delay, and an event that
    /// mirrors the measured level into `Set Level`.
    fn populate(engine: &Engine) {
        engine.registry.refresh_device_actions(&lamp());
        engine.scheduler.refresh_screen_triggers(&lamp());
        let set_level = engine
            .registry
            .device_actions(LAMP)
            .into_iter()
            .find(|a| matches!(a.body, ActionBody::Device { function, .. } if function == SET_LEVEL))
            .unwrap()
            .id();
        let sequence = engine.registry.create_sequence_action("Fade").unwrap();
        engine
            .registry
            .add_sequence_item(sequence, ActionId::DELAY_TYPE)
            .unwrap();
        engine.registry.add_sequence_item(sequence, set_level).unwrap();

        let read_level = engine
            .scheduler
            .screen_triggers()
            .into_iter()
            .find(|t| matches!(t.kind, TriggerKind::Message { .. }))
            .unwrap()
            .id();
        let event = engine.scheduler.create_event("Mirror").unwrap();
        let trigger = engine
            .scheduler
            .add_trigger_to_event(event, read_level)
            .unwrap();
        let binding = engine
            .scheduler
            .add_action_to_event(event, set_level)
            .unwrap();
        let measured = engine.scheduler.event(event).unwrap().trigger(trigger).unwrap().parameters[0];
        let level = engine.registry.action(binding).unwrap().parameters[0];
        engine.registry.set_dependency(level, measured).unwrap();
    }

    fn names(actions: &[Action]) -> Vec<String> {
        let mut names: Vec<_> = actions.iter().map(|a| a.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn should_load_nothing_from_empty_store() {
        let engine = engine();
        let service = service(&engine, Arc::new(InMemoryStore::default()));
        assert_eq!(service.load().unwrap(), LoadReport::default());
        assert!(service.snapshot().is_empty());
    }

    #[test]
    fn should_restore_saved_state() {
        let source = engine();
        populate(&source);
        let store = Arc::new(InMemoryStore::default());
        service(&source, Arc::clone(&store)).save().unwrap();
        let saved = store.load().unwrap().unwrap();

        let target = engine();
        let report = service(&target, Arc::clone(&store)).load().unwrap();
        assert_eq!(report.skipped, 0);
        assert_eq!(report.actions, saved.actions.len());
        assert_eq!(report.parameters, saved.parameters.len());
        assert_eq!(report.events, 1);
        assert_eq!(report.screen_triggers, 2);

        let restored = service(&target, store).snapshot();
        assert_eq!(names(&restored.actions), names(&saved.actions));
        assert_eq!(restored.parameters, saved.parameters);
        assert_eq!(restored.events.len(), 1);
        assert!(restored.events[0].is_complete());
        assert!(restored.events[0].triggers().iter().all(|t| t.is_subscribed()));
        assert_eq!(target.registry.user_actions().len(), 1);
        assert_eq!(target.registry.device_actions(LAMP).len(), 2);
    }

    #[test]
    fn should_fire_restored_event() {
        let source = engine();
        populate(&source);
        let store = Arc::new(InMemoryStore::default());
        service(&source, Arc::clone(&store)).save().unwrap();

        let target = engine();
        service(&target, store).load().unwrap();
        target.scheduler.message_arrived(&DeviceMessage {
            device: LAMP,
            function: READ_LEVEL,
            values: vec![Value::Byte(12)],
        });
        assert_eq!(target.scheduler.fire_ready_events(), 1);
        for _ in 0..300 {
            if !target.gateway.sent().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(target.gateway.sent(), vec![(LAMP, SET_LEVEL, vec![Value::Byte(12)])]);
    }

    #[test]
    fn should_skip_invalid_and_duplicate_identifiers() {
        let source = engine();
        populate(&source);
        let mut document = service(&source, Arc::new(InMemoryStore::default())).snapshot();
        let first = document.parameters[0].clone();
        document.parameters.push(first);
        let mut duplicate = document.actions[0].clone();
        duplicate.name = "Duplicate".to_string();
        document.actions.push(duplicate);

        let target = engine();
        let report = service(&target, Arc::new(InMemoryStore::default())).apply(document.clone());
        assert_eq!(report.skipped, 2);
        assert_eq!(report.actions, document.actions.len() - 1);
        assert!(target.registry.all_actions().iter().all(|a| a.name != "Duplicate"));
    }

    #[test]
    fn should_exclude_delay_template_from_snapshot() {
        let engine = engine();
        populate(&engine);
        let document = service(&engine, Arc::new(InMemoryStore::default())).snapshot();
        assert!(document.actions.iter().all(|a| a.id() != ActionId::DELAY_TYPE));
        assert!(
            document
                .parameters
                .iter()
                .all(|p| p.param.owner != Some(ParamOwner::Action(ActionId::DELAY_TYPE)))
        );
        assert_eq!(document.actions[0].name, "Delay");
    }
}
