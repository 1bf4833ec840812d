//! # Access Context
//!
//! Every repository and store call receives an explicit [`AccessContext`]
//! describing on whose authority it runs. Internal progress writes use
//! [`AccessContext::System`], which always names the principal the work is
//! being done for so that privileged calls remain auditable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user who initiated a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessContext {
    /// Call made with the rights of an end user
    User(Principal),
    /// Privileged internal call made on behalf of a principal
    System { on_behalf_of: String },
}

impl AccessContext {
    pub fn user(principal: Principal) -> Self {
        Self::User(principal)
    }

    pub fn system(on_behalf_of: impl Into<String>) -> Self {
        Self::System {
            on_behalf_of: on_behalf_of.into(),
        }
    }

    /// Id of the principal this call is attributed to.
    pub fn actor_id(&self) -> &str {
        match self {
            Self::User(principal) => &principal.id,
            Self::System { on_behalf_of } => on_behalf_of,
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

impl fmt::Display for AccessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(principal) => write!(f, "user:{}", principal.id),
            Self::System { on_behalf_of } => write!(f, "system(on_behalf_of={on_behalf_of})"),
        }
    }
}
