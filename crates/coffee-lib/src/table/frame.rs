//! Feature matrices handed to predictors
//!
//! A [`FeatureFrame`] keeps the row id of every row next to its feature
//! values so rows can be matched back to the historical table after
//! encoding, without relying on positions.

use super::Cell;
use crate::error::{PredictError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    row_ids: Vec<u64>,
    rows: Vec<Vec<Cell>>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            row_ids: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_ids(&self) -> &[u64] {
        &self.row_ids
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

    /// Append a row; values are padded to the frame width
    pub fn push(&mut self, row_id: u64, mut values: Vec<Cell>) {
        values.resize(self.columns.len(), Cell::Null);
        self.row_ids.push(row_id);
        self.rows.push(values);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Add a constant column unless one with that name already exists
    pub fn insert_column(&mut self, name: &str, fill: Cell) {
        if self.has_column(name) {
            return;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
    }

    /// Project onto `names` in order; every name must exist
    pub fn select(&self, names: &[String]) -> Result<FeatureFrame> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| PredictError::MissingColumns(n.clone()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(FeatureFrame {
            columns: names.to_vec(),
            row_ids: self.row_ids.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Keep the rows whose mask entry is true, preserving order
    pub fn filter(&self, mask: &[bool]) -> FeatureFrame {
        let mut out = FeatureFrame::new(self.columns.clone());
        for ((id, row), keep) in self.row_ids.iter().zip(&self.rows).zip(mask) {
            if *keep {
                out.row_ids.push(*id);
                out.rows.push(row.clone());
            }
        }
        out
    }

    /// Dense numeric view, one `Vec` per row
    ///
    /// Nulls become NaN. Text cells are rejected because a numeric model
    /// cannot consume them.
    pub fn to_matrix(&self) -> Result<Vec<Vec<f64>>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.columns)
                    .map(|(cell, name)| match cell {
                        Cell::Null => Ok(f64::NAN),
                        Cell::Int(v) => Ok(*v as f64),
                        Cell::Float(v) => Ok(*v),
                        Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                            PredictError::Model(format!(
                                "column '{}' holds non-numeric value '{}'",
                                name, s
                            ))
                        }),
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FeatureFrame {
        let mut f = FeatureFrame::new(vec!["year".into(), "country_Brazil".into()]);
        f.push(10, vec![Cell::Int(2019), Cell::Float(1.0)]);
        f.push(11, vec![Cell::Int(2020), Cell::Float(0.0)]);
        f
    }

    #[test]
    fn test_select_reorders_columns() {
        let selected = frame()
            .select(&["country_Brazil".to_string(), "year".to_string()])
            .unwrap();
        assert_eq!(selected.columns(), &["country_Brazil", "year"]);
        assert_eq!(selected.rows()[1], vec![Cell::Float(0.0), Cell::Int(2020)]);
        assert_eq!(selected.row_ids(), &[10, 11]);
    }

    #[test]
    fn test_filter_keeps_row_ids() {
        let filtered = frame().filter(&[false, true]);
        assert_eq!(filtered.row_ids(), &[11]);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_matrix_maps_nulls_to_nan_and_rejects_text() {
        let mut f = frame();
        f.push(12, vec![Cell::Null, Cell::Float(1.0)]);
        let m = f.to_matrix().unwrap();
        assert!(m[2][0].is_nan());

        f.push(13, vec!["Colombia".into(), Cell::Float(1.0)]);
        assert_eq!(f.to_matrix().unwrap_err().kind(), "Model");
    }
}
