//! # Registry Infrastructure
//!
//! Registries of pluggable components.
//!
//! ## Available Registries
//!
//! - **ActionHandlerRegistry**: Per-[`ActionType`](crate::models::ActionType)
//!   handlers, exposed to the executor through [`RegistryActionEngine`]

pub mod action_registry;

pub use action_registry::{ActionHandler, ActionHandlerRegistry, RegistryActionEngine};
