//! Locating the requested row in a built feature matrix and predicting it

use crate::artifact::ArtifactDescriptor;
use crate::error::{PredictError, Result};
use crate::table::{Cell, FeatureFrame, Table, COUNTRY, TYPE, YEAR};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The (country, type, year) a prediction is requested for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryKey {
    pub country: String,
    #[serde(rename = "type")]
    pub coffee_type: String,
    pub year: i32,
}

impl QueryKey {
    pub fn new(country: impl Into<String>, coffee_type: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            coffee_type: coffee_type.into(),
            year,
        }
    }

    /// Whether row `row` of `table` carries this key
    ///
    /// Each clause is checked only when its column exists.
    pub fn matches(&self, table: &Table, row: usize) -> bool {
        let year_ok = !table.has_column(YEAR)
            || table.get(row, YEAR).and_then(Cell::as_i64) == Some(self.year as i64);
        let country_ok = !table.has_column(COUNTRY)
            || table.get(row, COUNTRY).and_then(Cell::as_text).as_deref() == Some(self.country.as_str());
        let type_ok = !table.has_column(TYPE)
            || table.get(row, TYPE).and_then(Cell::as_text).as_deref() == Some(self.coffee_type.as_str());
        year_ok && country_ok && type_ok
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.country, self.coffee_type, self.year)
    }
}

/// Symmetric band around a point prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub fn around(pred: f64, half_width: f64) -> Self {
        Self {
            lo: pred - half_width,
            hi: pred + half_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub target: String,
    pub key: QueryKey,
    pub pred: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pi80: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pi95: Option<Interval>,
}

/// Mask over `features` selecting rows whose source row carries `key`
///
/// Feature rows are matched to `identity` rows through their row ids. A
/// feature row whose id is unknown never matches.
pub fn key_mask(features: &FeatureFrame, identity: &Table, key: &QueryKey) -> Vec<bool> {
    let by_id: HashMap<u64, usize> = (0..identity.len())
        .map(|i| (identity.row_id(i).unwrap_or(i as u64), i))
        .collect();
    features
        .row_ids()
        .iter()
        .map(|id| by_id.get(id).map(|&row| key.matches(identity, row)).unwrap_or(false))
        .collect()
}

/// Conform `features` to exactly the declared columns, in declared order
///
/// Declared columns the frame lacks are added as zeros; undeclared columns
/// are dropped.
pub fn align_columns(features: &FeatureFrame, declared: &[String]) -> Result<FeatureFrame> {
    let mut frame = features.clone();
    for column in declared {
        frame.insert_column(column, Cell::Int(0));
    }
    frame.select(declared)
}

/// Select the key's row, conform it to the artifact's columns and predict
///
/// When several rows match, the prediction for the last one is returned.
pub fn align_and_predict(
    features: &FeatureFrame,
    identity: &Table,
    artifact: &ArtifactDescriptor,
    key: &QueryKey,
) -> Result<PredictionResult> {
    let mask = key_mask(features, identity, key);
    if !mask.iter().any(|m| *m) {
        return Err(PredictError::RowNotFound(key.to_string()));
    }

    let aligned = match &artifact.expected_feature_columns {
        Some(declared) => align_columns(features, declared)?,
        None => features.clone(),
    };
    let matched = aligned.filter(&mask);

    let preds = artifact.model.predict(&matched)?;
    let pred = *preds
        .last()
        .ok_or_else(|| PredictError::Model("model returned no predictions".to_string()))?;

    Ok(PredictionResult {
        target: artifact.target_column.clone(),
        key: key.clone(),
        pred,
        pi80: artifact.interval80.map(|w| Interval::around(pred, w)),
        pi95: artifact.interval95.map(|w| Interval::around(pred, w)),
    })
}
