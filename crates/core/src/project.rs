//! Row projection: turn source records into a grid of cells, one cell per column.

#![forbid(unsafe_code)]

use serde_json::Value;
use smallvec::SmallVec;

use crate::columns::{ColumnDefinition, Content};
use crate::path::lookup;
use crate::{TableError, TableResult};

/// One resolved cell. `record` borrows the source record the cell was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell<'a> {
    pub record: &'a Value,
    pub content: Value,
    pub row_index: usize,
}

/// Cells of one record, in column order.
pub type Row<'a> = SmallVec<[Cell<'a>; 8]>;

/// Rows in source order.
pub type Grid<'a> = Vec<Row<'a>>;

/// Resolve the content of a single cell.
///
/// Accessors are called with the record, the column and the row index. Otherwise the
/// column's lookup path is resolved; an absent path yields the column default, then
/// `default_content`.
pub fn resolve_cell(record: &Value, column: &ColumnDefinition, row_index: usize, default_content: &Value) -> Value {
    if let Some(Content::Accessor(f)) = &column.content {
        return f.call(record, column, row_index);
    }
    match lookup(record, column.lookup_path()) {
        Some(v) => v.clone(),
        None => column.column_default().unwrap_or(default_content).clone(),
    }
}

pub fn project_row<'a>(
    record: &'a Value,
    row_index: usize,
    columns: &[ColumnDefinition],
    default_content: &Value,
) -> Row<'a> {
    columns
        .iter()
        .map(|c| Cell { record, content: resolve_cell(record, c, row_index, default_content), row_index })
        .collect()
}

/// Project every record into a row. Never fails: missing fields become default content.
pub fn project<'a>(rows: &'a [Value], columns: &[ColumnDefinition], default_content: &Value) -> Grid<'a> {
    let grid: Grid<'a> = rows
        .iter()
        .enumerate()
        .map(|(i, record)| project_row(record, i, columns, default_content))
        .collect();
    metrics::counter!("tably_rows_projected_total", grid.len() as u64);
    grid
}

/// Locate the row collection at `items_key` inside a response.
pub fn items<'a>(response: &'a Value, items_key: &str) -> TableResult<&'a [Value]> {
    match lookup(response, items_key) {
        Some(Value::Array(arr)) => Ok(arr.as_slice()),
        Some(_) => Err(TableError::ItemsNotArray { key: items_key.to_string() }),
        None => Err(TableError::ItemsNotFound { key: items_key.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn na() -> Value { json!("N/A") }

    #[test]
    fn missing_path_uses_global_default() {
        let cols = vec![ColumnDefinition::new("age", "Age").path("age")];
        let rows = vec![json!({ "age": 30 }), json!({})];
        let grid = project(&rows, &cols, &na());
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0][0].content, json!(30));
        assert_eq!(grid[0][0].row_index, 0);
        assert_eq!(grid[1][0].content, json!("N/A"));
        assert_eq!(grid[1][0].row_index, 1);
        assert!(std::ptr::eq(grid[1][0].record, &rows[1]));
    }

    #[test]
    fn column_default_beats_global_default() {
        let cols = vec![
            ColumnDefinition::new("city", "City").path("address.city").default_content("unknown"),
            ColumnDefinition::new("zip", "Zip").path("address.zip").default_content(""),
        ];
        let rows = vec![json!({ "address": {} })];
        let grid = project(&rows, &cols, &na());
        assert_eq!(grid[0][0].content, json!("unknown"));
        assert_eq!(grid[0][1].content, json!(""));
    }

    #[test]
    fn accessor_receives_record_column_and_index() {
        let cols = vec![
            ColumnDefinition::new("name", "Name"),
            ColumnDefinition::new("summary", "Summary").accessor(|rec, col, i| {
                json!(format!("{}#{}:{}", col.name, i, rec["name"].as_str().unwrap_or("?")))
            }),
        ];
        let rows = vec![json!({ "name": "a" }), json!({ "name": "b" })];
        let grid = project(&rows, &cols, &na());
        assert_eq!(grid[1][1].content, json!("summary#1:b"));
        assert_eq!(grid[0][0].content, json!("a"));
    }

    #[test]
    fn shape_matches_input_and_registry() {
        let cols = vec![
            ColumnDefinition::new("a", "A"),
            ColumnDefinition::new("b", "B"),
            ColumnDefinition::new("c", "C"),
        ];
        let rows: Vec<Value> = (0..5).map(|i| json!({ "a": i, "c": i * 2 })).collect();
        let grid = project(&rows, &cols, &na());
        assert_eq!(grid.len(), rows.len());
        for (i, row) in grid.iter().enumerate() {
            assert_eq!(row.len(), cols.len());
            assert_eq!(row[0].content, json!(i));
            assert_eq!(row[1].content, json!("N/A"));
            assert_eq!(row[2].content, json!(i * 2));
        }
        assert!(project(&[], &cols, &na()).is_empty());
    }

    #[test]
    fn present_null_is_kept() {
        let cols = vec![ColumnDefinition::new("x", "X")];
        let rows = vec![json!({ "x": null })];
        assert_eq!(project(&rows, &cols, &na())[0][0].content, Value::Null);
    }

    #[test]
    fn items_locates_row_collection() {
        let resp = json!({ "data": { "products": [{ "id": 1 }] }, "count": 1 });
        assert_eq!(items(&resp, "data.products").unwrap().len(), 1);
        assert_eq!(items(&resp, "products").unwrap_err(), TableError::ItemsNotFound { key: "products".into() });
        assert_eq!(items(&resp, "count").unwrap_err(), TableError::ItemsNotArray { key: "count".into() });
    }
}
