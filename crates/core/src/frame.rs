//! In-memory tabular dataset passed between the source client and the warehouse.
//!
//! A [`Frame`] keeps every cell as optional text (`None` is SQL NULL); the
//! warehouse coerces values to the destination column types on insert.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FrameError;

/// One row of cells, ordered like [`Frame::columns`].
pub type Row = Vec<Option<String>>;

/// Cell texts treated as missing values.
pub const NULL_TOKENS: &[&str] = &[
    "", "null", "NULL", "Null", "NaN", "nan", "-NaN", "-nan", "None", "NA", "N/A", "n/a", "<NA>",
    "NaT", "#N/A", "#NA",
];

/// Returns `true` if the text is a null placeholder rather than a value.
pub fn is_null_like(value: &str) -> bool {
    NULL_TOKENS.contains(&value.trim())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a frame, checking that every row matches the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Row>) -> Result<Self, FrameError> {
        let mut frame = Self::new(columns);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), FrameError> {
        if row.len() != self.columns.len() {
            return Err(FrameError::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
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

    /// Zero-based index of a column by name (case-sensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> Result<usize, FrameError> {
        self.column_index(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_string()))
    }

    /// Value at the given row and column, `None` for NULL or out of range.
    pub fn get_value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<Option<&str>>, FrameError> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|r| r[idx].as_deref()).collect())
    }

    /// Drop rows where `column` equals `value`. Returns the number removed.
    pub fn exclude_value(&mut self, column: &str, value: &str) -> Result<usize, FrameError> {
        let idx = self.require_column(column)?;
        let before = self.rows.len();
        self.rows.retain(|r| r[idx].as_deref() != Some(value));
        Ok(before - self.rows.len())
    }

    /// Set `column` to `value` on every row, appending the column if absent.
    pub fn set_column(&mut self, column: &str, value: Option<String>) {
        match self.column_index(column) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
    }

    /// Remove exact duplicate rows, keeping the first occurrence.
    pub fn drop_duplicates(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Row> = HashSet::with_capacity(before);
        self.rows.retain(|r| seen.insert(r.clone()));
        before - self.rows.len()
    }

    /// Replace null placeholders ("", "NaN", "null", ...) with real NULLs.
    pub fn normalize_nulls(&mut self) -> usize {
        let mut replaced = 0;
        for cell in self.rows.iter_mut().flat_map(|r| r.iter_mut()) {
            if cell.as_deref().is_some_and(is_null_like) {
                *cell = None;
                replaced += 1;
            }
        }
        replaced
    }

    /// Rows as JSON arrays of objects keyed by column name, `chunk_rows` rows each.
    pub fn to_json_chunks(&self, chunk_rows: usize) -> Vec<Value> {
        self.rows
            .chunks(chunk_rows.max(1))
            .map(|chunk| {
                Value::Array(
                    chunk
                        .iter()
                        .map(|row| {
                            let record: Map<String, Value> = self
                                .columns
                                .iter()
                                .zip(row)
                                .map(|(col, cell)| {
                                    let v = match cell {
                                        Some(s) => Value::String(s.clone()),
                                        None => Value::Null,
                                    };
                                    (col.clone(), v)
                                })
                                .collect();
                            Value::Object(record)
                        })
                        .collect(),
                )
            })
            .collect()
    }
}
