//! ONNX inference using tract
//!
//! Regression graphs exported to ONNX take a single `[rows, features]` f32
//! input and return one value per row. The graph is parsed once at load
//! time and specialized to the batch shape on every call.

use super::{OnnxSpec, Predictor};
use crate::error::{PredictError, Result};
use crate::table::FeatureFrame;
use anyhow::Context;
use std::path::Path;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Metadata property holding the fitted input column names
pub const FEATURE_NAMES_PROP: &str = "feature_names";

/// Inference latency above which a warning is logged
const MAX_INFERENCE_MS: u128 = 50;

/// ONNX-based predictor using tract for lightweight inference
pub struct OnnxPredictor {
    model: InferenceModel,
    feature_names: Option<Vec<String>>,
}

impl OnnxPredictor {
    /// Load a graph from disk; feature names come from the graph metadata
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let proto = tract_onnx::onnx()
            .proto_model_for_read(&mut std::io::Cursor::new(&bytes))
            .map_err(|e| PredictError::artifact(path, format!("failed to parse ONNX model: {}", e)))?;

        let feature_names = proto
            .metadata_props
            .iter()
            .find(|p| p.key == FEATURE_NAMES_PROP)
            .map(|p| parse_feature_names(&p.value));

        let model = tract_onnx::onnx()
            .model_for_proto_model(&proto)
            .map_err(|e| PredictError::artifact(path, format!("failed to load ONNX graph: {}", e)))?;

        debug!(path = %path.display(), features = ?feature_names, "Loaded ONNX model");
        Ok(Self {
            model,
            feature_names,
        })
    }

    pub(crate) fn from_spec(spec: OnnxSpec, base_dir: &Path) -> Result<Self> {
        let path = if spec.path.is_absolute() {
            spec.path
        } else {
            base_dir.join(spec.path)
        };
        if !path.exists() {
            return Err(PredictError::not_found("ONNX model", path));
        }
        let mut predictor = Self::load(&path)?;
        if spec.feature_names.is_some() {
            predictor.feature_names = spec.feature_names;
        }
        Ok(predictor)
    }

    fn run(&self, matrix: Vec<Vec<f64>>, cols: usize) -> TractResult<Vec<f32>> {
        let rows = matrix.len();
        let data: Vec<f32> = matrix.into_iter().flatten().map(|v| v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((rows, cols), data)?.into();

        let plan = self
            .model
            .clone()
            .with_input_fact(0, f32::fact([rows, cols]).into())?
            .into_optimized()?
            .into_runnable()?;
        let result = plan.run(tvec!(input.into()))?;
        let output = result.first().context("No output from model")?;
        Ok(output.to_array_view::<f32>()?.iter().copied().collect())
    }
}

impl Predictor for OnnxPredictor {
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>> {
        let start = Instant::now();
        let input = match &self.feature_names {
            Some(names) => features.select(names)?,
            None => features.clone(),
        };
        let rows = input.len();
        if rows == 0 {
            return Ok(Vec::new());
        }

        let values = self
            .run(input.to_matrix()?, input.columns().len())
            .map_err(|e| PredictError::Model(format!("ONNX inference failed: {}", e)))?;
        if values.is_empty() || values.len() % rows != 0 {
            return Err(PredictError::Model(format!(
                "model returned {} values for {} rows",
                values.len(),
                rows
            )));
        }

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        // Multi-output graphs: first output column per row
        let stride = values.len() / rows;
        Ok(values.iter().step_by(stride).map(|v| *v as f64).collect())
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn describe(&self) -> String {
        "onnx".to_string()
    }
}

/// Accepts a JSON array or a comma separated list
fn parse_feature_names(raw: &str) -> Vec<String> {
    serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|_| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
