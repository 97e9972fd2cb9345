//! Device service: use-cases driven by the device collaborator.

use std::sync::Arc;

use synhub_domain::device::{DeviceDescriptor, DeviceMessage, StatusChange};
use synhub_domain::error::SynhubError;
use synhub_domain::id::DeviceId;

use crate::ports::DeviceCatalog;
use crate::registry::{ActionRegistry, not_found};
use crate::scheduler::EventScheduler;

/// Turns discovery results and device traffic into engine updates.
pub struct DeviceService<C> {
    catalog: C,
    registry: Arc<ActionRegistry>,
    scheduler: Arc<EventScheduler>,
}

impl<C: DeviceCatalog> DeviceService<C> {
    /// Create a new service over the given catalog.
    pub fn new(catalog: C, registry: Arc<ActionRegistry>, scheduler: Arc<EventScheduler>) -> Self {
        Self {
            catalog,
            registry,
            scheduler,
        }
    }

    /// Regenerate the device's actions and screen triggers. Nothing happens
    /// until the full parameter list is known. Returns how many actions were
    /// created.
    #[tracing::instrument(skip(self, device), fields(device = %device.id, name = %device.name))]
    pub fn device_discovered(&self, device: &DeviceDescriptor, full_parameters_known: bool) -> usize {
        if !full_parameters_known {
            tracing::debug!("parameter list incomplete, waiting");
            return 0;
        }
        let actions = self.registry.refresh_device_actions(device);
        let triggers = self.scheduler.refresh_screen_triggers(device);
        tracing::info!(actions, triggers, "device refreshed");
        actions
    }

    /// Look a device up in the catalog and refresh it.
    ///
    /// # Errors
    ///
    /// Returns [`SynhubError::NotFound`] when the catalog does not know `id`.
    pub fn discover(&self, id: DeviceId) -> Result<usize, SynhubError> {
        let device = self
            .catalog
            .device(id)
            .ok_or_else(|| not_found("Device", id))?;
        Ok(self.device_discovered(&device, true))
    }

    /// Refresh every device in the catalog.
    pub fn discover_all(&self) -> usize {
        self.catalog
            .devices()
            .iter()
            .map(|device| self.device_discovered(device, true))
            .sum()
    }

    /// A device function returned.
    pub fn message_received(&self, message: &DeviceMessage) {
        tracing::trace!(device = %message.device, function = %message.function, "message received");
        self.scheduler.message_arrived(message);
    }

    /// A device or the network went up or down.
    pub fn status_changed(&self, change: &StatusChange) {
        tracing::debug!(device = ?change.device, status = %change.status, "status changed");
        self.scheduler.status_changed(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::test_support::{InMemoryCatalog, LAMP, READ_LEVEL, lamp, registry};
    use synhub_domain::device::LinkStatus;
    use synhub_domain::error::NotFoundError;
    use synhub_domain::trigger::TriggerKind;
    use synhub_domain::value::Value;

    fn make_service() -> (DeviceService<InMemoryCatalog>, Arc<ActionRegistry>, Arc<EventScheduler>) {
        let (registry, _, bus) = registry(1);
        let scheduler = Arc::new(EventScheduler::new(
            Arc::clone(&registry),
            bus,
            SchedulerConfig::default(),
        ));
        let service = DeviceService::new(
            InMemoryCatalog::with(vec![lamp()]),
            Arc::clone(&registry),
            Arc::clone(&scheduler),
        );
        (service, registry, scheduler)
    }

    #[test]
    fn should_generate_actions_and_triggers_on_discovery() {
        let (service, registry, scheduler) = make_service();
        assert_eq!(service.device_discovered(&lamp(), true), 2);
        assert_eq!(registry.device_actions(LAMP).len(), 2);
        assert_eq!(scheduler.screen_triggers().len(), 2);
    }

    #[test]
    fn should_wait_for_full_parameter_list() {
        let (service, registry, scheduler) = make_service();
        assert_eq!(service.device_discovered(&lamp(), false), 0);
        assert!(registry.device_actions(LAMP).is_empty());
        assert!(scheduler.screen_triggers().is_empty());
    }

    #[test]
    fn should_keep_actions_on_rediscovery() {
        let (service, registry, _) = make_service();
        service.discover(LAMP).unwrap();
        let before: Vec<_> = registry.device_actions(LAMP).iter().map(|a| a.id()).collect();
        assert_eq!(service.discover_all(), 0);
        let after: Vec<_> = registry.device_actions(LAMP).iter().map(|a| a.id()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn should_return_not_found_for_unknown_device() {
        let (service, _, _) = make_service();
        let err = service.discover(DeviceId::from_raw(0xbeef)).unwrap_err();
        assert!(matches!(
            err,
            SynhubError::NotFound(NotFoundError { entity: "Device", .. })
        ));
    }

    #[test]
    fn should_forward_traffic_to_scheduler() {
        let (service, registry, scheduler) = make_service();
        service.discover_all();
        service.message_received(&DeviceMessage {
            device: LAMP,
            function: READ_LEVEL,
            values: vec![Value::Byte(64)],
        });
        service.status_changed(&StatusChange {
            device: Some(LAMP),
            status: LinkStatus::Down,
        });
        let triggers = scheduler.screen_triggers();
        assert!(triggers.iter().all(|t| t.did_fire()));
        let read = triggers
            .iter()
            .find(|t| matches!(t.kind, TriggerKind::Message { .. }))
            .unwrap();
        assert_eq!(registry.resolve_value(read.parameters[0]), Some(Value::Byte(64)));
    }
}
