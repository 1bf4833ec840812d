//! # Action Handler Registry
//!
//! Dispatches task actions to handlers registered per [`ActionType`].
//!
//! ## Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use bulk_task_core::models::{AccessContext, ActionDescriptor, ActionFailure, ActionType};
//! use bulk_task_core::registry::{ActionHandler, ActionHandlerRegistry, RegistryActionEngine};
//! use std::sync::Arc;
//!
//! struct SoftDelete;
//!
//! #[async_trait]
//! impl ActionHandler for SoftDelete {
//!     async fn handle(
//!         &self,
//!         _ctx: &AccessContext,
//!         _entity_id: &str,
//!         _action: &ActionDescriptor,
//!     ) -> Result<(), ActionFailure> {
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = ActionHandlerRegistry::new();
//! registry.register(ActionType::Delete, Arc::new(SoftDelete));
//! let engine = RegistryActionEngine::new(registry);
//! assert!(engine.registry().supports(ActionType::Delete));
//! ```

use crate::models::{AccessContext, ActionDescriptor, ActionFailure, ActionType};
use crate::orchestration::types::ActionEngine;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Applies one action to one entity.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &AccessContext,
        entity_id: &str,
        action: &ActionDescriptor,
    ) -> Result<(), ActionFailure>;
}

#[derive(Clone, Default)]
pub struct ActionHandlerRegistry {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler>>,
}

impl std::fmt::Debug for ActionHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionHandlerRegistry")
            .field("action_types", &self.registered_types())
            .finish()
    }
}

impl ActionHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same type.
    pub fn register(&mut self, action_type: ActionType, handler: Arc<dyn ActionHandler>) {
        if self.handlers.insert(action_type, handler).is_some() {
            info!(action_type = %action_type, "Replaced action handler");
        } else {
            debug!(action_type = %action_type, "Registered action handler");
        }
    }

    pub fn get(&self, action_type: ActionType) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&action_type).cloned()
    }

    pub fn supports(&self, action_type: ActionType) -> bool {
        self.handlers.contains_key(&action_type)
    }

    pub fn registered_types(&self) -> Vec<ActionType> {
        let mut types: Vec<ActionType> = self.handlers.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// [`ActionEngine`] backed by an [`ActionHandlerRegistry`].
///
/// Actions run in list order and the first failure ends the sequence for
/// that element. An action with no registered handler fails the element.
#[derive(Debug, Clone, Default)]
pub struct RegistryActionEngine {
    registry: ActionHandlerRegistry,
}

impl RegistryActionEngine {
    pub fn new(registry: ActionHandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionHandlerRegistry {
        &self.registry
    }
}

#[async_trait]
impl ActionEngine for RegistryActionEngine {
    async fn apply(
        &self,
        ctx: &AccessContext,
        entity_id: &str,
        actions: &[ActionDescriptor],
    ) -> Result<(), ActionFailure> {
        for (position, action) in actions.iter().enumerate() {
            let handler = self.registry.get(action.action_type).ok_or_else(|| {
                ActionFailure::new(format!(
                    "no handler registered for {} (action #{position})",
                    action.action_type
                ))
            })?;
            handler
                .handle(ctx, entity_id, action)
                .await
                .map_err(|failure| {
                    ActionFailure::new(format!(
                        "{} (action #{position}) failed: {}",
                        action.action_type, failure.message
                    ))
                })?;
        }
        Ok(())
    }
}
