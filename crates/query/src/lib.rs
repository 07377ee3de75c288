//! Tably query layer.
//!
//! Defines the query collaborator contract (`QuerySource`), a few built-in sources,
//! and `DataTable`, the driver that fetches a response, projects it through the
//! column registry and hands it to a template.

#![forbid(unsafe_code)]

pub mod cache;
pub mod source;
pub mod state;
pub mod table;

pub use cache::{CachedSource, DEFAULT_CACHE_CAPACITY};
pub use source::{FetchPolicy, FileSource, QueryError, QueryRequest, QueryResult, QuerySource, StaticSource};
pub use state::FetchState;
pub use table::DataTable;
