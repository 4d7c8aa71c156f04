//! Tabular result shapes for table panels.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Sentinel rendered for a cell with no value.
pub const NOT_AVAILABLE: &str = "n/a";

/// A single table cell.
///
/// Cells are either a label value, a query value, or missing. Missing cells
/// render as the `"n/a"` sentinel when formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableCell {
    /// A label value.
    Text(String),
    /// A query value.
    Number(f64),
    /// No value for this column in this row.
    Missing,
}

impl TableCell {
    /// Returns the numeric value if this cell holds one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(_) | Self::Missing => None,
        }
    }

    /// Returns the text value if this cell holds one.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) | Self::Missing => None,
        }
    }
}

impl std::fmt::Display for TableCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Missing => write!(f, "{NOT_AVAILABLE}"),
        }
    }
}

/// Describes one table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name: a label key, or a query name for value columns.
    pub name: String,
    /// The query this column belongs to; empty for label columns.
    #[serde(rename = "queryName")]
    pub query_name: String,
    /// True when this column carries query values rather than labels.
    #[serde(rename = "isValueColumn")]
    pub is_value_column: bool,
}

impl ColumnDescriptor {
    /// Creates a label column.
    #[must_use]
    pub fn label(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query_name: String::new(),
            is_value_column: false,
        }
    }

    /// Creates a value column for the given query.
    #[must_use]
    pub fn value(query_name: impl Into<String>) -> Self {
        let query_name = query_name.into();
        Self {
            name: query_name.clone(),
            query_name,
            is_value_column: true,
        }
    }
}

/// One table row, keyed by column name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRow {
    /// Cell values keyed by column name.
    pub data: HashMap<String, TableCell>,
}

impl TableRow {
    /// Returns the cell for a column, treating absent entries as missing.
    #[must_use]
    pub fn cell(&self, column: &str) -> &TableCell {
        static MISSING: TableCell = TableCell::Missing;
        self.data.get(column).unwrap_or(&MISSING)
    }
}

/// A pivoted table for table panels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    /// Ordered column descriptors.
    pub columns: Vec<ColumnDescriptor>,
    /// Rows in presentation order.
    pub rows: Vec<TableRow>,
}
