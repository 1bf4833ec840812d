//! # Store Adapters
//!
//! Interfaces to the two external collaborators the engine persists through:
//! the entity collection a QUERY task traverses ([`EntityStore`]) and the task
//! records themselves ([`TaskRepository`]). In-memory implementations live in
//! [`memory`]; PostgreSQL implementations in [`crate::database`].

pub mod memory;
pub mod traits;

pub use memory::{InMemoryEntityStore, InMemoryTaskRepository};
pub use traits::{EntityStore, Page, TaskRepository};
