//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.
//!
//! The engine runs on OS threads, so every port is a plain synchronous trait.

pub mod device;
pub mod document_store;
pub mod notify;

pub use device::{DeviceCatalog, DeviceGateway};
pub use document_store::DocumentStore;
pub use notify::ChangePublisher;
