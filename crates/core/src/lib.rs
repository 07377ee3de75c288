//! Tably core types: column registry, header sort state, row projection and
//! the render template contract.
//!
//! Everything in this crate is synchronous and free of I/O. Fetching rows is the
//! job of a query collaborator (see the `tably-query` crate); this crate only
//! turns a response into headers and cells.

#![forbid(unsafe_code)]

pub mod columns;
pub mod path;
pub mod project;
pub mod sort;
pub mod template;

pub use columns::{build_registry, Accessor, ColumnDefinition, ColumnRegistry, Content, HeaderState, SortDirection};
pub use project::{items, project, project_row, resolve_cell, Cell, Grid, Row};
pub use sort::{order_enum, SortController, SortDirective};
pub use template::{display_value, EventOutcome, JsonTemplate, TableEvent, TableHandle, TableView, Template, TextTemplate};

/// Default content for cells whose path resolves to nothing.
pub const DEFAULT_CONTENT: &str = "N/A";

/// Errors raised while building a registry or locating rows in a response.
///
/// Missing fields inside a record are never errors; they resolve to default content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("duplicate column name `{name}` at positions {first} and {second}")]
    DuplicateColumn { name: String, first: usize, second: usize },
    #[error("column at position {index} has an empty name")]
    EmptyColumnName { index: usize },
    #[error("items key `{key}` not found in response")]
    ItemsNotFound { key: String },
    #[error("items key `{key}` does not hold an array")]
    ItemsNotArray { key: String },
}

pub type TableResult<T> = Result<T, TableError>;

pub mod prelude {
    pub use super::{
        Cell, ColumnDefinition, ColumnRegistry, Content, Grid, HeaderState, Row, SortController, SortDirection,
        SortDirective, TableError, TableEvent, TableHandle, TableResult, TableView, Template,
    };
}
