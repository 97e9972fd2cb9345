//! # synhubd, the synhub daemon
//!
//! Composition root that wires the engine to its adapters and runs until
//! interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Initialize logging
//! - Construct adapters (virtual devices, JSON document store)
//! - Construct the engine: action registry, event scheduler, services
//! - Load the persisted document, then discover devices
//! - Pump device messages into the scheduler
//! - On SIGINT: stop the scheduler and save the document
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::thread;

use anyhow::Context;
use synhub_adapter_storage_json::JsonFileStore;
use synhub_adapter_virtual::VirtualIntegration;
use synhub_app::change_bus::ChangeBus;
use synhub_app::registry::ActionRegistry;
use synhub_app::scheduler::EventScheduler;
use synhub_app::services::device_service::DeviceService;
use synhub_app::services::document_service::DocumentService;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Adapters
    let devices = Arc::new(VirtualIntegration::default());
    let store = JsonFileStore::new(&config.storage.document_path);
    let bus = Arc::new(ChangeBus::default());

    // Engine
    let registry = Arc::new(
        ActionRegistry::new(config.engine_config(), devices.clone(), bus.clone())
            .context("starting action workers")?,
    );
    let scheduler = Arc::new(EventScheduler::new(
        Arc::clone(&registry),
        bus.clone(),
        config.scheduler_config(),
    ));

    // Services
    let documents = DocumentService::new(store, Arc::clone(&registry), Arc::clone(&scheduler));
    let device_service = Arc::new(DeviceService::new(
        devices.clone(),
        Arc::clone(&registry),
        Arc::clone(&scheduler),
    ));

    let report = documents.load().context("loading document")?;
    tracing::info!(
        actions = report.actions,
        events = report.events,
        skipped = report.skipped,
        "document restored"
    );
    if config.integrations.virtual_enabled {
        let created = device_service.discover_all();
        tracing::info!(created, "virtual devices discovered");
    }

    let messages = devices.subscribe();
    let pump = Arc::clone(&device_service);
    thread::Builder::new()
        .name("message-pump".to_string())
        .spawn(move || {
            while let Ok(message) = messages.recv() {
                pump.message_received(&message);
            }
        })
        .context("starting message pump")?;

    let mut changes = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => tracing::debug!(?change, "change"),
                Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "change log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    scheduler.spawn().context("starting event scheduler")?;
    tracing::info!(
        document = %config.storage.document_path.display(),
        "synhubd running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutting down");
    scheduler.shutdown();
    documents.save().context("saving document")?;
    Ok(())
}
