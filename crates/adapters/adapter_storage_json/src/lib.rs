//! # synhub-adapter-storage-json
//!
//! JSON file persistence for the engine's [`Document`](synhub_domain::document::Document).
//!
//! ## Responsibilities
//! - Implement the `DocumentStore` port defined in `synhub-app::ports`
//! - Wrap the document in a versioned envelope
//! - Replace the file atomically (write a sibling temp file, then rename)
//!
//! ## Dependency rule
//! Depends on `synhub-app` (for port traits) and `synhub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod store;

pub use error::StorageError;
pub use store::{FORMAT_VERSION, JsonFileStore};
