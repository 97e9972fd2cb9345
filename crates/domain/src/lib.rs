//! # synhub-domain
//!
//! Pure domain model for the synhub automation rule engine.
//!
//! ## Responsibilities
//! - Foundational types: typed 64-bit identifiers, error conventions, timestamps
//! - Define **Values** and **Validation rules** for data moving through the system
//! - Define **Parameters** (typed value slots with lineage) and their roles
//! - Define **Actions** (device calls, delays, sequences, event bindings)
//! - Define **Triggers** (message, date-time, status latches)
//! - Define **Events** (trigger combinators bound to actions)
//! - Define the persisted **Document** that references everything by id
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! Lookups that need live state (dependent parameters, full names) go through
//! the [`parameter::ParameterResolver`] trait, implemented by the `app` crate.

pub mod error;
pub mod id;
pub mod time;

pub mod action;
pub mod change;
pub mod device;
pub mod document;
pub mod event;
pub mod parameter;
pub mod trigger;
pub mod validation;
pub mod value;
