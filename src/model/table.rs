// src/model/table.rs
use crate::model::types::DataType;
use crate::model::value::Value;
use std::collections::HashSet;

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An in-memory table: ordered columns and rows aligned with them.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a table with no columns and no rows.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row. Short rows are padded with `Null`, long rows truncated.
    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Cell at (`row`, `column`), or `None` if either is out of range.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Iterate over the values of one column.
    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Count the null cells of one column.
    pub fn null_count(&self, column: &str) -> Option<usize> {
        Some(self.column_values(column)?.filter(|v| v.is_null()).count())
    }

    /// Count null cells across every column.
    pub fn total_nulls(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().filter(|v| v.is_null()).count())
            .sum()
    }

    /// The canonical key strings present in a column, nulls excluded.
    pub fn key_set(&self, column: &str) -> HashSet<String> {
        self.column_values(column)
            .map(|values| values.filter_map(Value::key_string).collect())
            .unwrap_or_default()
    }

    /// Add a column computed from each row, or replace it if it already exists.
    pub fn set_column<F>(&mut self, column: Column, mut compute: F)
    where
        F: FnMut(&Table, usize) -> Value,
    {
        let snapshot: &Table = self;
        let values: Vec<Value> = (0..snapshot.rows.len())
            .map(|i| compute(snapshot, i))
            .collect();
        match self.column_index(&column.name) {
            Some(idx) => {
                self.columns[idx] = column;
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(column);
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
    }

    /// Copy this table under a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Table {
        Table {
            name: name.into(),
            columns: self.columns.clone(),
            rows: self.rows.clone(),
        }
    }
}
