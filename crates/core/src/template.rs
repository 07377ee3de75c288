//! Render templates: swappable presenters for the loading, error and table states.

#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::columns::{HeaderState, SortDirection};
use crate::project::{Grid, Row};
use crate::sort::{order_enum, SortDirective};

/// What a template gets to draw a loaded table: current headers plus the projected grid.
#[derive(Debug, Clone, Copy)]
pub struct TableView<'v, 'a> {
    pub headers: &'v [HeaderState],
    pub rows: &'v Grid<'a>,
}

/// Presentation of the three table states. Implementations choose their output type
/// (text, JSON, widgets, ...).
///
/// Templates never hold the table. Interactive templates report clicks as
/// [`TableEvent`]s and the host passes them to [`TableHandle::dispatch`].
pub trait Template {
    type Output;

    fn render_loading(&self) -> Self::Output;

    /// Errors are forwarded as-is; templates only display them.
    fn render_error(&self, error: &dyn fmt::Display) -> Self::Output;

    fn render_table(&self, view: &TableView<'_, '_>) -> Self::Output;
}

/// A click reported by a template, addressed by header index or row index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "camelCase")]
pub enum TableEvent {
    HeaderClick(usize),
    RowClick(usize),
}

/// Result of dispatching a [`TableEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Sorted(SortDirective),
    RowClicked(usize),
    /// Unknown or non-sortable header, or no such row.
    Ignored,
}

/// Interactions a template (or its host) can route back into the table.
pub trait TableHandle {
    fn headers(&self) -> &[HeaderState];

    /// Header click; returns the directive when the sort changed.
    fn on_header_click(&mut self, index: usize) -> Option<SortDirective>;

    /// Row click by row index; returns `false` when there is no such row.
    fn on_row_click(&mut self, row_index: usize) -> bool;

    fn dispatch(&mut self, event: TableEvent) -> EventOutcome {
        match event {
            TableEvent::HeaderClick(index) => match self.on_header_click(index) {
                Some(directive) => EventOutcome::Sorted(directive),
                None => EventOutcome::Ignored,
            },
            TableEvent::RowClick(row_index) if self.on_row_click(row_index) => EventOutcome::RowClicked(row_index),
            TableEvent::RowClick(_) => EventOutcome::Ignored,
        }
    }
}

/// Display text of a cell value: strings as-is, `null` empty, everything else as JSON.
pub fn display_value(v: &Value) -> Cow<'_, str> {
    match v {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn header_text(h: &HeaderState) -> String {
    match h.sorted {
        Some(SortDirection::Ascending) => format!("{} ↑", h.label),
        Some(SortDirection::Descending) => format!("{} ↓", h.label),
        None => h.label.clone(),
    }
}

fn row_texts(row: &Row<'_>) -> Vec<String> {
    row.iter().map(|c| display_value(&c.content).into_owned()).collect()
}

/// Plain-text table with padded columns.
#[derive(Debug, Clone)]
pub struct TextTemplate {
    pub loading_text: String,
    pub error_text: String,
    pub empty_text: Option<String>,
}

impl Default for TextTemplate {
    fn default() -> Self {
        Self { loading_text: "Loading...".into(), error_text: "Error".into(), empty_text: Some("(no rows)".into()) }
    }
}

impl Template for TextTemplate {
    type Output = String;

    fn render_loading(&self) -> String { self.loading_text.clone() }

    fn render_error(&self, error: &dyn fmt::Display) -> String {
        format!("{}: {}", self.error_text, error)
    }

    fn render_table(&self, view: &TableView<'_, '_>) -> String {
        let labels: Vec<String> = view.headers.iter().map(header_text).collect();
        let body: Vec<Vec<String>> = view.rows.iter().map(row_texts).collect();

        let mut widths: Vec<usize> = labels.iter().map(|l| l.chars().count()).collect();
        for texts in body.iter() {
            for (i, t) in texts.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(t.chars().count());
            }
        }

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| format!("{:<width$}", cells.get(i).map(String::as_str).unwrap_or(""), width = *w))
                .collect();
            padded.join("  ").trim_end().to_string()
        };

        let mut out: Vec<String> = Vec::with_capacity(body.len() + 1);
        out.push(line(&labels));
        for texts in body.iter() {
            out.push(line(texts));
        }
        if body.is_empty() {
            if let Some(empty) = &self.empty_text { out.push(empty.clone()); }
        }
        out.join("\n")
    }
}

/// JSON document with headers, active order and cell contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTemplate;

impl Template for JsonTemplate {
    type Output = Value;

    fn render_loading(&self) -> Value { json!({ "state": "loading" }) }

    fn render_error(&self, error: &dyn fmt::Display) -> Value {
        json!({ "state": "error", "message": error.to_string() })
    }

    fn render_table(&self, view: &TableView<'_, '_>) -> Value {
        let order = view
            .headers
            .iter()
            .find_map(|h| h.sorted.map(|d| order_enum(&h.name, d)));
        let rows: Vec<Value> = view
            .rows
            .iter()
            .map(|r| Value::Array(r.iter().map(|c| c.content.clone()).collect()))
            .collect();
        json!({
            "state": "ready",
            "headers": view.headers,
            "order": order,
            "rows": rows,
        })
    }
}
