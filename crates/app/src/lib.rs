//! # synhub-app
//!
//! Application layer: the automation engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceCatalog`: descriptors of discovered devices
//!   - `DeviceGateway`: send, lock and unlock device functions
//!   - `DocumentStore`: load and save the persisted document
//!   - `ChangePublisher`: change notifications for the presentation layer
//! - Provide the engine services:
//!   - `ActionRegistry`: identity allocation, lookup, editing and dispatch
//!   - `EventScheduler`: trigger evaluation and event firing on its own thread
//!   - `DeviceService`: device discovery and message intake
//!   - `DocumentService`: the load pipeline and snapshots
//! - Provide **in-process infrastructure** (change bus, worker pool) that
//!   doesn't need IO
//!
//! ## Concurrency
//! All concurrency is OS-thread based: a fixed worker pool runs dispatched
//! actions and one scheduler thread evaluates events. Nothing here needs an
//! async runtime.
//!
//! ## Dependency rule
//! Depends on `synhub-domain` only (plus `tokio::sync` for the change bus).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod change_bus;
pub mod config;
pub mod execution;
pub mod instance_lock;
pub mod pool;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
