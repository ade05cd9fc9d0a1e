//! End-to-end prediction requests
//!
//! A request loads the artifact, normalizes the historical table, rewrites
//! the key to the table's casing, appends a synthetic row when the key is
//! absent, builds features and predicts. Nothing is cached between
//! requests.

use crate::aligner::{align_and_predict, PredictionResult, QueryKey};
use crate::artifact::{load_artifact, ArtifactDescriptor};
use crate::error::Result;
use crate::features::{FeatureBuilder, FeatureHook};
use crate::observability::{BotMetrics, StructuredLogger};
use crate::table::{load_first_existing, normalize, Cell, Table, COUNTRY, ROW_ID, TYPE, YEAR};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Prediction entry point shared by the chat loop and one-shot commands
#[derive(Clone)]
pub struct PredictionService {
    features: FeatureBuilder,
    metrics: BotMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    pub fn new(logger: StructuredLogger) -> Self {
        Self {
            features: FeatureBuilder::new(),
            metrics: BotMetrics::new(),
            logger,
        }
    }

    /// Use a project-supplied feature hook ahead of the built-in encodings
    pub fn with_hook(mut self, hook: Arc<dyn FeatureHook>) -> Self {
        self.features = FeatureBuilder::with_hook(hook);
        self
    }

    /// Load the historical table from the first existing candidate
    pub fn load_data(&self, candidates: &[PathBuf]) -> Result<Table> {
        load_first_existing(candidates)
    }

    /// Load the artifact at `artifact_path` and predict `key`
    pub fn predict(&self, table: &Table, artifact_path: &Path, key: &QueryKey) -> Result<PredictionResult> {
        let start = Instant::now();
        let outcome = load_artifact(artifact_path).and_then(|artifact| {
            self.logger.log_artifact_loaded(&artifact);
            self.predict_with(table, &artifact, key)
        });
        self.record(outcome, start, &infer_label(artifact_path))
    }

    /// Predict `key` with an already loaded artifact
    pub fn predict_with(
        &self,
        table: &Table,
        artifact: &ArtifactDescriptor,
        key: &QueryKey,
    ) -> Result<PredictionResult> {
        let mut table = normalize(table.clone());
        let key = canonical_key(&table, key);

        table.assign_row_ids();
        let appended = augment(&mut table, &key, &artifact.grouping_columns);
        debug!(key = %key, synthetic_row = appended, rows = table.len(), "Prepared historical table");

        let features = self.features.build(
            &table,
            &artifact.target_column,
            artifact.expected_feature_columns.as_deref(),
            artifact.raw_columns,
        )?;
        debug!(strategy = features.strategy.as_str(), columns = features.columns.len(), "Built features");

        align_and_predict(&features.frame, &table, artifact, &key)
    }

    fn record(&self, outcome: Result<PredictionResult>, start: Instant, target: &str) -> Result<PredictionResult> {
        let elapsed = start.elapsed();
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        match &outcome {
            Ok(result) => {
                self.metrics.inc_predictions_served();
                self.logger.log_prediction(result, elapsed.as_millis());
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(e.kind());
                self.logger.log_prediction_failed(target, e);
            }
        }
        outcome
    }
}

fn infer_label(path: &Path) -> String {
    crate::artifact::infer_target_from_filename(path).to_string()
}

/// Rewrite country and type to the casing observed in the table
pub fn canonical_key(table: &Table, key: &QueryKey) -> QueryKey {
    QueryKey {
        country: canonical_value(table, COUNTRY, &key.country),
        coffee_type: canonical_value(table, TYPE, &key.coffee_type),
        year: key.year,
    }
}

fn canonical_value(table: &Table, column: &str, value: &str) -> String {
    let wanted = value.to_lowercase();
    table
        .distinct_text(column)
        .into_iter()
        .find(|v| v.to_lowercase() == wanted)
        .unwrap_or_else(|| value.to_string())
}

/// Append a row carrying `key` unless one already exists
///
/// Only year and the grouping columns present in the table are filled;
/// every other field is null. Returns whether a row was appended.
pub fn augment(table: &mut Table, key: &QueryKey, grouping_columns: &[String]) -> bool {
    let all_keys_present = [YEAR, COUNTRY, TYPE].iter().all(|c| table.has_column(c));
    if all_keys_present && (0..table.len()).any(|row| key.matches(table, row)) {
        return false;
    }

    let mut row = vec![Cell::Null; table.columns().len()];
    let mut fill = |column: &str, value: Cell| {
        if let Some(idx) = table.column_index(column) {
            row[idx] = value;
        }
    };
    fill(YEAR, Cell::Int(key.year as i64));
    for column in grouping_columns {
        match column.as_str() {
            COUNTRY => fill(COUNTRY, Cell::Text(key.country.clone())),
            TYPE => fill(TYPE, Cell::Text(key.coffee_type.clone())),
            _ => {}
        }
    }
    fill(ROW_ID, Cell::Int(table.next_row_id() as i64));
    table.push_row(row);
    true
}
