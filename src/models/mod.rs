//! # Models
//!
//! Data types shared by every component: the persisted [`Task`] record, the
//! validated [`FilterDocument`], action descriptors and the access context
//! passed into every store call.

pub mod access;
pub mod action;
pub mod filter;
pub mod task;

pub use access::{AccessContext, Principal};
pub use action::{validate_actions, ActionContext, ActionDescriptor, ActionFailure, ActionType};
pub use filter::{FilterDocument, FilterSelector};
pub use task::{
    CursorGuard, ElementError, Task, TaskCursor, TaskErrors, TaskKind, TaskPatch, TaskPayload,
    TaskProgress, TaskQuery,
};
