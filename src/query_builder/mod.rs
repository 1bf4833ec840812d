//! # Query Builder System
//!
//! Turns a task's filter document into a store-level query description and,
//! for the PostgreSQL entity store, into SQL.
//!
//! ## Key Components
//!
//! - [`aliases`] - loaded-once filter key → store field table
//! - [`compiler`] - [`FilterCompiler`], filter document + cursor → [`QuerySpec`]
//! - [`query_spec`] - the store-neutral query description
//! - [`sql`] - PostgreSQL rendering with bound parameters
//!
//! ## Example Usage
//!
//! ```rust
//! use bulk_task_core::models::FilterDocument;
//! use bulk_task_core::query_builder::FilterCompiler;
//!
//! let document = FilterDocument::parse(
//!     r#"{"entity_type":[{"id":"Report"}],"createdBy":[{"id":"U1"}]}"#,
//! ).unwrap();
//! let spec = FilterCompiler::default().compile(&document, None).unwrap();
//! assert_eq!(spec.types, vec!["Report".to_string()]);
//! assert_eq!(spec.field_filters[0].field, "rel_created-by.internal_id");
//! ```

pub mod aliases;
pub mod compiler;
pub mod query_spec;
#[cfg(feature = "postgres")]
pub mod sql;

pub use aliases::FilterAliasTable;
pub use compiler::FilterCompiler;
pub use query_spec::{FieldFilter, QueryOrder, QuerySpec, SortDirection};
