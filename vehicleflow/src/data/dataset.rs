//! In-memory tabular dataset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A single dataset value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Missing value.
    Null,
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(String),
}

impl Cell {
    /// Converts a JSON document value into a cell.
    ///
    /// Booleans become `1.0`/`0.0`; nested arrays and objects are kept as
    /// their JSON text.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Returns true for a missing value.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the numeric value, if any.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text value, if any.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Errors raised when building a dataset from rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// A row does not have one cell per column.
    #[error("row {row} has {actual} cells, expected {expected}")]
    RaggedRow {
        /// Row index.
        row: usize,
        /// Column count.
        expected: usize,
        /// Cells found.
        actual: usize,
    },

    /// Two columns share a name.
    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// Ordered columns and row-major cells.
///
/// Row order is stable for the lifetime of a dataset; every transformation
/// consumes the dataset and returns a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Creates a dataset, checking that every row matches the column count.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate column names or ragged rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, DatasetError> {
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.clone()));
            }
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DatasetError::RaggedRow {
                    row: idx,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Materializes documents into a dataset.
    ///
    /// Columns appear in first-seen order across documents; a document that
    /// lacks a key gets `Null` in that column.
    #[must_use]
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = serde_json::Map<String, serde_json::Value>>,
    {
        let records: Vec<_> = records.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for record in &records {
            for key in record.keys() {
                if !index.contains_key(key) {
                    index.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row = vec![Cell::Null; columns.len()];
                for (key, value) in record {
                    row[index[key]] = Cell::from_json(value);
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns true if the column exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Iterates over one column's cells, or `None` if it is absent.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Removes a column if present.
    #[must_use]
    pub fn drop_column(mut self, name: &str) -> Self {
        if let Some(idx) = self.column_index(name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
        self
    }

    /// Replaces every cell for which `f` returns a new value.
    #[must_use]
    pub fn map_cells<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(&Cell) -> Option<Cell>,
    {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let Some(replacement) = f(cell) {
                    *cell = replacement;
                }
            }
        }
        self
    }

    /// Builds a new dataset from the rows at `indices`, in that order.
    #[must_use]
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}
