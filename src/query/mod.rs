mod runner;

pub use runner::{DatabricksRunner, QueryExecutor};

use crate::error::{ExportError, Result};
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Fixed rendering format for temporal cells.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A single scalar cell. Numbers keep the server's textual form so no
/// precision is lost between the warehouse and the page.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(String),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl CellValue {
    /// Renders the cell for display. Nulls use the caller's placeholder so
    /// an absent value is always distinguishable from an empty string.
    pub fn display(&self, null_placeholder: &str) -> String {
        match self {
            CellValue::Null => null_placeholder.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => n.clone(),
            CellValue::Text(t) => t.clone(),
            CellValue::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// An immutable tabular query result: an ordered column list plus rows
/// validated against it at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    columns: Vec<Column>,
    rows: Vec<Vec<CellValue>>,
    truncated: bool,
}

impl QueryResult {
    /// Builds a result, rejecting duplicate column names and any row whose
    /// arity does not match the declared columns.
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<CellValue>>, truncated: bool) -> Result<Self> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(ExportError::QueryExecution(format!(
                    "duplicate column name in result: {}",
                    col.name
                )));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(ExportError::QueryExecution(format!(
                    "row {} has {} values but result declares {} columns",
                    idx,
                    row.len(),
                    columns.len()
                )));
            }
        }
        Ok(Self {
            columns,
            rows,
            truncated,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when the warehouse reported that the row limit clipped the
    /// result, so callers never have to infer truncation from row counts.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn columns() -> Vec<Column> {
        vec![Column::new("id", "BIGINT"), Column::new("name", "STRING")]
    }

    #[test]
    fn test_new_accepts_matching_rows() {
        let rows = vec![
            vec![CellValue::Number("1".into()), CellValue::Text("a".into())],
            vec![CellValue::Number("2".into()), CellValue::Null],
        ];
        let result = QueryResult::new(columns(), rows, false).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.column_count(), 2);
        assert!(!result.truncated());
    }

    #[test]
    fn test_new_rejects_arity_mismatch() {
        let rows = vec![vec![CellValue::Number("1".into())]];
        let err = QueryResult::new(columns(), rows, false).unwrap_err();
        assert!(err.to_string().contains("row 0"));
    }

    #[test]
    fn test_new_rejects_duplicate_column_names() {
        let cols = vec![Column::new("id", "BIGINT"), Column::new("id", "STRING")];
        let err = QueryResult::new(cols, vec![], false).unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn test_empty_result_is_valid() {
        let result = QueryResult::new(columns(), vec![], false).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_display_null_uses_placeholder() {
        assert_eq!(CellValue::Null.display("—"), "—");
        assert_eq!(CellValue::Null.display(""), "");
    }

    #[test]
    fn test_display_number_preserves_native_precision() {
        let cell = CellValue::Number("1500.00".into());
        assert_eq!(cell.display("—"), "1500.00");
    }

    #[test]
    fn test_display_timestamp_uses_fixed_format() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 30, 5)
            .unwrap();
        assert_eq!(CellValue::Timestamp(ts).display("—"), "2024-03-09 14:30:05");
    }
}
