//! Header sort state: single-column sort driven by header clicks.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::columns::{ColumnRegistry, HeaderState, SortDirection};

/// Sort token in `<name>_ASC` / `<name>_DESC` form.
pub fn order_enum(name: &str, direction: SortDirection) -> String {
    format!("{}_{}", name, direction.order_suffix())
}

/// Emitted when a header click changes the sort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDirective {
    pub name: String,
    pub label: String,
    pub sortable: bool,
    pub index: usize,
    pub sorted: SortDirection,
    pub order_enum: String,
}

/// Owns the header collection. At most one header is sorted at any time.
#[derive(Debug, Clone, Default)]
pub struct SortController {
    headers: Vec<HeaderState>,
}

impl SortController {
    pub fn new(headers: Vec<HeaderState>) -> Self { Self { headers } }

    pub fn from_registry(registry: &ColumnRegistry) -> Self { Self::new(registry.headers()) }

    pub fn headers(&self) -> &[HeaderState] { &self.headers }

    /// The sorted header, if any.
    pub fn active(&self) -> Option<&HeaderState> {
        self.headers.iter().find(|h| h.sorted.is_some())
    }

    pub fn order_enum(&self) -> Option<String> {
        self.active().and_then(|h| h.sorted.map(|d| order_enum(&h.name, d)))
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.name == name)
    }

    /// Handle a click on the header at `index`.
    ///
    /// Non-sortable or unknown headers are ignored. Otherwise every header is reset and
    /// the clicked one moves to its next direction; the new collection replaces the old
    /// one in a single assignment.
    pub fn on_header_click(&mut self, index: usize) -> Option<SortDirective> {
        let clicked = match self.headers.get(index) {
            Some(h) if h.sortable => h,
            Some(h) => {
                debug!(column = %h.name, "click on non-sortable header ignored");
                return None;
            }
            None => {
                debug!(index, "click on unknown header ignored");
                return None;
            }
        };
        let next = SortDirection::next(clicked.sorted);

        let headers: Vec<HeaderState> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| HeaderState { sorted: if i == index { Some(next) } else { None }, ..h.clone() })
            .collect();
        self.headers = headers;

        let h = &self.headers[index];
        let directive = SortDirective {
            name: h.name.clone(),
            label: h.label.clone(),
            sortable: h.sortable,
            index: h.index,
            sorted: next,
            order_enum: order_enum(&h.name, next),
        };
        metrics::counter!("tably_sort_changes_total", 1u64, "direction" => next.as_str());
        info!(column = %directive.name, order = %directive.order_enum, "sort changed");
        Some(directive)
    }
}
