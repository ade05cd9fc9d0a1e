//! In-memory tables for historical coffee market data
//!
//! The historical dataset is small (one row per country, type and year), so
//! tables are plain row-major vectors of [`Cell`] values. Columns are looked
//! up by name.

mod frame;
mod io;
mod schema;

pub use frame::FeatureFrame;
pub use io::{load_first_existing, read_csv, write_csv, DEFAULT_DATA_CANDIDATES};
pub use schema::{normalize, COUNTRY, TYPE, YEAR};

use crate::error::{PredictError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the synthetic row identity column
pub const ROW_ID: &str = "row_id";

/// A single table value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Infer a cell from raw delimited text
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Null;
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return Cell::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f64>() {
            if v.is_nan() {
                return Cell::Null;
            }
            return Cell::Float(v);
        }
        Cell::Text(raw.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Null => None,
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Integer view; floats only convert when they carry no fraction
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Null => None,
            Cell::Int(v) => Some(*v),
            Cell::Float(v) => integral(*v),
            Cell::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
        }
    }

    /// Text view; `None` for nulls
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 {
        Some(v as i64)
    } else {
        None
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

/// Row-major table with named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows; short rows are padded with nulls
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row, padding or truncating it to the table width
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    pub fn set(&mut self, row: usize, column: &str, value: Cell) -> bool {
        let Some(idx) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row) {
            Some(r) => {
                r[idx] = value;
                true
            }
            None => false,
        }
    }

    /// Add a column filled with `fill`, or leave an existing column untouched
    pub fn add_column(&mut self, name: &str, fill: Cell) {
        if self.has_column(name) {
            return;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every value of a column in place
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = f(&row[idx]);
            }
        }
    }

    pub fn column_values(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Distinct non-null text values of a column in first-seen order
    pub fn distinct_text(&self, name: &str) -> Vec<String> {
        let mut seen = Vec::new();
        if let Some(values) = self.column_values(name) {
            for value in values.into_iter().filter_map(Cell::as_text) {
                if !seen.contains(&value) {
                    seen.push(value);
                }
            }
        }
        seen
    }

    /// Project onto the named columns, in the given order
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| PredictError::MissingColumns(n.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Table {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    /// Assign sequential row ids `0..len`
    ///
    /// Any existing `row_id` column is overwritten; row identity is owned by
    /// the pipeline, never taken from source data.
    pub fn assign_row_ids(&mut self) {
        match self.column_index(ROW_ID) {
            Some(idx) => {
                for (i, row) in self.rows.iter_mut().enumerate() {
                    row[idx] = Cell::Int(i as i64);
                }
            }
            None => {
                self.columns.push(ROW_ID.to_string());
                for (i, row) in self.rows.iter_mut().enumerate() {
                    row.push(Cell::Int(i as i64));
                }
            }
        }
    }

    /// Next unused row id
    pub fn next_row_id(&self) -> u64 {
        (0..self.len())
            .filter_map(|row| self.row_id(row))
            .max()
            .map(|max| max.saturating_add(1))
            .unwrap_or(0)
            .max(self.rows.len() as u64)
    }

    pub fn row_id(&self, row: usize) -> Option<u64> {
        self.get(row, ROW_ID)
            .and_then(Cell::as_i64)
            .and_then(|v| u64::try_from(v).ok())
    }
}
