//! Feature construction for artifact predictors
//!
//! Three strategies, tried in order:
//! 1. an injected [`FeatureHook`], when one is configured; if it fails the
//!    builder falls back to one-hot encoding (strategy 3)
//! 2. raw passthrough of year/country/type for predictors that encode
//!    categorical columns themselves
//! 3. one-hot encoding of country/type, restricted to the declared feature
//!    columns when the artifact has them
//!
//! Every produced row keeps the row id of its source row.

use crate::error::{PredictError, Result};
use crate::table::{Cell, FeatureFrame, Table, COUNTRY, TYPE, YEAR};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key columns in feature order
const BASE_COLUMNS: [&str; 3] = [YEAR, COUNTRY, TYPE];

/// Columns that get one indicator per observed category
const CATEGORICAL: [&str; 2] = [COUNTRY, TYPE];

/// Which strategy produced a feature set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Hook,
    RawPassthrough,
    OneHot,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Hook => "hook",
            Strategy::RawPassthrough => "raw_passthrough",
            Strategy::OneHot => "one_hot",
        }
    }
}

/// Output of feature construction
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub frame: FeatureFrame,
    /// Target values per row when the target column exists
    pub labels: Option<Vec<Option<f64>>>,
    /// Feature column names actually used
    pub columns: Vec<String>,
    pub strategy: Strategy,
}

/// Project-supplied feature construction
///
/// Receives the (possibly augmented) historical table and the target column.
/// Errors are never fatal: the builder logs them and falls back.
pub trait FeatureHook: Send + Sync {
    fn build(&self, table: &Table, target: &str) -> anyhow::Result<FeatureSet>;
}

impl<F> FeatureHook for F
where
    F: Fn(&Table, &str) -> anyhow::Result<FeatureSet> + Send + Sync,
{
    fn build(&self, table: &Table, target: &str) -> anyhow::Result<FeatureSet> {
        self(table, target)
    }
}

/// Builds feature matrices from historical tables
#[derive(Clone, Default)]
pub struct FeatureBuilder {
    hook: Option<Arc<dyn FeatureHook>>,
}

impl FeatureBuilder {
    pub fn new() -> Self {
        Self { hook: None }
    }

    pub fn with_hook(hook: Arc<dyn FeatureHook>) -> Self {
        Self { hook: Some(hook) }
    }

    /// Build features for `target`.
    ///
    /// `declared` is the artifact's expected feature list, `raw_columns`
    /// whether its predictor wants unencoded key columns.
    pub fn build(
        &self,
        table: &Table,
        target: &str,
        declared: Option<&[String]>,
        raw_columns: bool,
    ) -> Result<FeatureSet> {
        if let Some(hook) = &self.hook {
            match hook.build(table, target) {
                Ok(set) => {
                    debug!(columns = set.columns.len(), rows = set.frame.len(), "Features built by hook");
                    return Ok(set);
                }
                Err(e) => {
                    warn!(error = %e, "Feature hook failed, falling back to one-hot encoding");
                    return fallback_features(table, target, declared);
                }
            }
        }
        if raw_columns {
            return raw_features(table, target);
        }
        fallback_features(table, target, declared)
    }
}

/// Raw year/country/type columns for predictors that encode internally
pub fn raw_features(table: &Table, target: &str) -> Result<FeatureSet> {
    let base = present_base_columns(table)?;
    let frame = project(table, &base);
    Ok(FeatureSet {
        columns: frame.columns().to_vec(),
        labels: labels(table, target),
        frame,
        strategy: Strategy::RawPassthrough,
    })
}

/// One-hot fallback encoding
pub fn fallback_features(table: &Table, target: &str, declared: Option<&[String]>) -> Result<FeatureSet> {
    let frame = match declared.filter(|d| !d.is_empty()) {
        Some(declared) => {
            let keep: Vec<String> = declared
                .iter()
                .filter(|c| table.has_column(c))
                .cloned()
                .collect();
            if keep.is_empty() {
                return Err(PredictError::InvalidFeatureSpec(format!(
                    "none of the declared feature columns [{}] exist in the data",
                    declared.join(", ")
                )));
            }
            one_hot(table, &keep)
        }
        None => one_hot(table, &present_base_columns(table)?),
    };
    Ok(FeatureSet {
        columns: frame.columns().to_vec(),
        labels: labels(table, target),
        frame,
        strategy: Strategy::OneHot,
    })
}

fn present_base_columns(table: &Table) -> Result<Vec<String>> {
    let base: Vec<String> = BASE_COLUMNS
        .iter()
        .filter(|c| table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if base.is_empty() {
        return Err(PredictError::MissingColumns(
            "need at least one of year, country, type".to_string(),
        ));
    }
    Ok(base)
}

fn row_id(table: &Table, row: usize) -> u64 {
    table.row_id(row).unwrap_or(row as u64)
}

fn project(table: &Table, columns: &[String]) -> FeatureFrame {
    let indices: Vec<usize> = columns.iter().filter_map(|c| table.column_index(c)).collect();
    let mut frame = FeatureFrame::new(columns.to_vec());
    for (i, row) in table.rows().iter().enumerate() {
        frame.push(row_id(table, i), indices.iter().map(|&j| row[j].clone()).collect());
    }
    frame
}

/// Expand the categorical columns among `columns` into indicators.
///
/// Non-categorical columns keep their order and come first; then each
/// categorical column contributes one `<column>_<value>` indicator per
/// distinct value, sorted. No category is dropped.
pub fn one_hot(table: &Table, columns: &[String]) -> FeatureFrame {
    let plain: Vec<String> = columns
        .iter()
        .filter(|c| !CATEGORICAL.contains(&c.as_str()))
        .cloned()
        .collect();
    let encoded: Vec<(usize, Vec<String>)> = columns
        .iter()
        .filter(|c| CATEGORICAL.contains(&c.as_str()))
        .filter_map(|c| {
            let idx = table.column_index(c)?;
            let categories: BTreeSet<String> =
                table.rows().iter().filter_map(|r| r[idx].as_text()).collect();
            Some((idx, categories.into_iter().collect()))
        })
        .collect();

    let mut names = plain.clone();
    for (idx, categories) in &encoded {
        let column = &table.columns()[*idx];
        names.extend(categories.iter().map(|v| format!("{}_{}", column, v)));
    }

    let plain_idx: Vec<usize> = plain.iter().filter_map(|c| table.column_index(c)).collect();
    let mut frame = FeatureFrame::new(names);
    for (i, row) in table.rows().iter().enumerate() {
        let mut values: Vec<Cell> = plain_idx.iter().map(|&j| row[j].clone()).collect();
        for (idx, categories) in &encoded {
            let value = row[*idx].as_text();
            values.extend(categories.iter().map(|c| {
                Cell::Float(if value.as_deref() == Some(c.as_str()) { 1.0 } else { 0.0 })
            }));
        }
        frame.push(row_id(table, i), values);
    }
    frame
}

fn labels(table: &Table, target: &str) -> Option<Vec<Option<f64>>> {
    table
        .column_values(target)
        .map(|values| values.into_iter().map(Cell::as_f64).collect())
}
