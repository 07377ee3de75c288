//! `DataTable`: wires columns, sort state, a query source and a template together.

#![forbid(unsafe_code)]

use serde_json::Value;
use tably_core::{
    items, project, project_row, ColumnDefinition, ColumnRegistry, Grid, HeaderState, Row, SortController,
    SortDirective, TableHandle, TableResult, TableView, Template, DEFAULT_CONTENT,
};
use tracing::{debug, info, warn};

use crate::source::{QueryRequest, QuerySource};
use crate::state::FetchState;

type OrderChangeFn = Box<dyn FnMut(&SortDirective) + Send>;
type RowClickFn = Box<dyn FnMut(&Row<'_>) + Send>;
type CompletedFn = Box<dyn FnMut(&Value) + Send>;

/// A sortable table backed by a query source and drawn by a template.
///
/// Data is fetched only when the caller asks for it via [`DataTable::refresh`]; a sort
/// change never triggers a fetch on its own. With an order variable configured, sort
/// changes are written into the request variables so the next refresh picks them up.
pub struct DataTable<S, T> {
    source: S,
    template: T,
    registry: ColumnRegistry,
    controller: SortController,
    request: QueryRequest,
    items_key: String,
    default_content: Value,
    order_variable: Option<String>,
    state: FetchState,
    on_order_change: Option<OrderChangeFn>,
    on_row_click: Option<RowClickFn>,
    on_completed: Option<CompletedFn>,
}

impl<S: QuerySource, T: Template> DataTable<S, T> {
    pub fn new(source: S, template: T, registry: ColumnRegistry, request: QueryRequest) -> Self {
        let controller = SortController::from_registry(&registry);
        Self {
            source,
            template,
            registry,
            controller,
            request,
            items_key: "items".to_string(),
            default_content: Value::String(DEFAULT_CONTENT.to_string()),
            order_variable: None,
            state: FetchState::Idle,
            on_order_change: None,
            on_row_click: None,
            on_completed: None,
        }
    }

    /// Validate `columns` and build a table from them.
    pub fn with_columns(
        source: S,
        template: T,
        columns: Vec<ColumnDefinition>,
        request: QueryRequest,
    ) -> TableResult<Self> {
        Ok(Self::new(source, template, ColumnRegistry::new(columns)?, request))
    }

    /// Path of the row collection inside the response (default `items`).
    pub fn items_key(mut self, key: impl Into<String>) -> Self {
        self.items_key = key.into();
        self
    }

    pub fn default_content(mut self, value: impl Into<Value>) -> Self {
        self.default_content = value.into();
        self
    }

    /// Request variable that receives the order enum on every sort change.
    pub fn order_variable(mut self, name: impl Into<String>) -> Self {
        self.order_variable = Some(name.into());
        self
    }

    pub fn with_order_change<F: FnMut(&SortDirective) + Send + 'static>(mut self, f: F) -> Self {
        self.on_order_change = Some(Box::new(f));
        self
    }

    pub fn with_row_click<F: FnMut(&Row<'_>) + Send + 'static>(mut self, f: F) -> Self {
        self.on_row_click = Some(Box::new(f));
        self
    }

    pub fn with_completed<F: FnMut(&Value) + Send + 'static>(mut self, f: F) -> Self {
        self.on_completed = Some(Box::new(f));
        self
    }

    pub fn state(&self) -> &FetchState { &self.state }
    pub fn request(&self) -> &QueryRequest { &self.request }
    pub fn registry(&self) -> &ColumnRegistry { &self.registry }

    /// Fetch the data. While the fetch is in flight the table is pending; a refresh
    /// dropped before completion leaves it pending.
    pub async fn refresh(&mut self) -> &FetchState {
        self.state = FetchState::Pending;
        match self.source.fetch(&self.request).await {
            Ok(response) => {
                metrics::counter!("tably_fetch_total", 1u64, "outcome" => "success");
                info!(query = %self.request.query, policy = %self.request.fetch_policy, "fetch completed");
                if let Some(cb) = self.on_completed.as_mut() {
                    cb(&response);
                }
                self.state = FetchState::Success(response);
            }
            Err(e) => {
                metrics::counter!("tably_fetch_total", 1u64, "outcome" => "failure");
                warn!(error = %e, query = %self.request.query, "fetch failed");
                self.state = FetchState::Failure(e);
            }
        }
        &self.state
    }

    /// Projected grid of the last successful response.
    pub fn grid(&self) -> Option<TableResult<Grid<'_>>> {
        let response = self.state.response()?;
        Some(items(response, &self.items_key).map(|rows| project(rows, self.registry.columns(), &self.default_content)))
    }

    /// Draw the current state with the template.
    pub fn render(&self) -> T::Output {
        if self.state.is_loading() {
            return self.template.render_loading();
        }
        if let Some(e) = self.state.error() {
            return self.template.render_error(e);
        }
        let Some(response) = self.state.response() else { return self.template.render_loading() };
        match items(response, &self.items_key) {
            Ok(rows) => {
                let grid = project(rows, self.registry.columns(), &self.default_content);
                self.template.render_table(&TableView { headers: self.controller.headers(), rows: &grid })
            }
            Err(e) => {
                warn!(error = %e, "response has no rows to show");
                self.template.render_error(&e)
            }
        }
    }

    /// Header click addressed by column name.
    pub fn click_header_by_name(&mut self, name: &str) -> Option<SortDirective> {
        match self.registry.position(name) {
            Some(index) => self.on_header_click(index),
            None => {
                debug!(column = %name, "click on unknown column ignored");
                None
            }
        }
    }
}

impl<S: QuerySource, T: Template> TableHandle for DataTable<S, T> {
    fn headers(&self) -> &[HeaderState] {
        self.controller.headers()
    }

    fn on_header_click(&mut self, index: usize) -> Option<SortDirective> {
        let directive = self.controller.on_header_click(index)?;
        if let Some(var) = &self.order_variable {
            self.request.variables.insert(var.clone(), Value::String(directive.order_enum.clone()));
        }
        if let Some(cb) = self.on_order_change.as_mut() {
            cb(&directive);
        }
        Some(directive)
    }

    fn on_row_click(&mut self, row_index: usize) -> bool {
        let Some(response) = self.state.response() else { return false };
        let Ok(rows) = items(response, &self.items_key) else { return false };
        let Some(record) = rows.get(row_index) else { return false };
        let row = project_row(record, row_index, self.registry.columns(), &self.default_content);
        if let Some(cb) = self.on_row_click.as_mut() {
            cb(&row);
        }
        true
    }
}
