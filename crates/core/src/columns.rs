//! Column definitions and the header registry built from them.
//!
//! This module provides:
//! - `ColumnDefinition`: the author-supplied description of one column
//! - `ColumnRegistry`: a validated, ordered set of definitions
//! - `HeaderState`: per-column header state, including the current sort

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{TableError, TableResult};

/// Sort direction of a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Direction a header moves to when clicked. Unsorted headers start ascending;
    /// sorted headers flip and never return to unsorted.
    pub fn next(current: Option<SortDirection>) -> SortDirection {
        match current {
            None | Some(SortDirection::Descending) => SortDirection::Ascending,
            Some(SortDirection::Ascending) => SortDirection::Descending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }

    /// Suffix used in order enums (`ASC`/`DESC`).
    pub fn order_suffix(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Custom cell accessor: `(record, column, row_index) -> content`.
#[derive(Clone)]
pub struct Accessor(Arc<dyn Fn(&Value, &ColumnDefinition, usize) -> Value + Send + Sync>);

impl Accessor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &ColumnDefinition, usize) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, record: &Value, column: &ColumnDefinition, row_index: usize) -> Value {
        (self.0)(record, column, row_index)
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor(..)")
    }
}

/// Where a column takes its cell content from.
#[derive(Debug, Clone)]
pub enum Content {
    /// Dotted path into the record, e.g. `owner.address.city` or `tags[0]`.
    Path(String),
    /// Function computing the content from the record.
    Accessor(Accessor),
}

// Only paths survive a round trip through config files; accessors are attached in code.
impl Serialize for Content {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Content::Path(p) => serializer.serialize_str(p),
            Content::Accessor(_) => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Content::Path)
    }
}

/// Declarative description of one table column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_content: Option<Value>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self { name: name.into(), label: label.into(), sortable: false, content: None, default_content: None }
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    /// Read the cell from `path` instead of the column name.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.content = Some(Content::Path(path.into()));
        self
    }

    pub fn accessor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &ColumnDefinition, usize) -> Value + Send + Sync + 'static,
    {
        self.content = Some(Content::Accessor(Accessor::new(f)));
        self
    }

    pub fn default_content(mut self, value: impl Into<Value>) -> Self {
        self.default_content = Some(value.into());
        self
    }

    /// Path used to look up the cell: a non-empty content path, else the column name.
    pub fn lookup_path(&self) -> &str {
        match &self.content {
            Some(Content::Path(p)) if !p.is_empty() => p,
            _ => &self.name,
        }
    }

    /// Per-column default, if one is set. Only `null` counts as unset; `""`, `0` and `false` are kept.
    pub fn column_default(&self) -> Option<&Value> {
        match &self.default_content {
            None | Some(Value::Null) => None,
            Some(v) => Some(v),
        }
    }
}

/// Header state of one column. `index` is the stable identity of the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderState {
    pub name: String,
    pub label: String,
    pub sortable: bool,
    pub index: usize,
    pub sorted: Option<SortDirection>,
}

/// Build the initial header collection: one unsorted header per definition, in order.
pub fn build_registry(columns: &[ColumnDefinition]) -> Vec<HeaderState> {
    columns
        .iter()
        .enumerate()
        .map(|(index, c)| HeaderState {
            name: c.name.clone(),
            label: c.label.clone(),
            sortable: c.sortable,
            index,
            sorted: None,
        })
        .collect()
}

/// Validated, ordered column definitions. Names are non-empty and unique.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<ColumnDefinition>,
    by_name: FxHashMap<String, usize>,
}

impl ColumnRegistry {
    pub fn new(columns: Vec<ColumnDefinition>) -> TableResult<Self> {
        let mut by_name: FxHashMap<String, usize> = FxHashMap::default();
        for (index, c) in columns.iter().enumerate() {
            if c.name.is_empty() {
                return Err(TableError::EmptyColumnName { index });
            }
            if let Some(&first) = by_name.get(&c.name) {
                return Err(TableError::DuplicateColumn { name: c.name.clone(), first, second: index });
            }
            by_name.insert(c.name.clone(), index);
        }
        Ok(Self { columns, by_name })
    }

    pub fn columns(&self) -> &[ColumnDefinition] { &self.columns }
    pub fn len(&self) -> usize { self.columns.len() }
    pub fn is_empty(&self) -> bool { self.columns.is_empty() }
    pub fn get(&self, index: usize) -> Option<&ColumnDefinition> { self.columns.get(index) }

    /// Position of the column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn headers(&self) -> Vec<HeaderState> {
        build_registry(&self.columns)
    }
}
