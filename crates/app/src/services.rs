//! Application services: use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.
//! The engine itself (registry and scheduler) is shared through `Arc`.

pub mod device_service;
pub mod document_service;
