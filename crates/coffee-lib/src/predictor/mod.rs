//! Regression predictors loaded from artifacts
//!
//! Artifacts describe their estimator with a [`ModelSpec`]. Building a spec
//! yields a boxed [`Predictor`] that carries its own capabilities: the input
//! column names it was fitted on and whether it encodes categorical columns
//! itself.

mod inference;
mod linear;
mod pipeline;


pub use inference::OnnxPredictor;
pub use linear::LinearModel;
pub use pipeline::{ColumnEncoder, EncodedColumn, NamedStep, Pipeline, PipelineSpec, StandardScaler, StepSpec};

use crate::error::Result;
use crate::table::FeatureFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Predict one value per input row
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>>;

    /// Input column names recorded when the estimator was fitted
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// True when the predictor one-hot encodes raw categorical columns itself
    fn expects_raw_columns(&self) -> bool {
        false
    }

    /// Short human-readable description used in logs
    fn describe(&self) -> String;
}

/// Transformation stage inside a pipeline
pub trait Transformer: Send + Sync {
    fn transform(&self, features: &FeatureFrame) -> Result<FeatureFrame>;

    /// True for stages that turn raw categorical columns into indicators
    fn encodes_columns(&self) -> bool {
        false
    }

    fn describe(&self) -> String;
}

/// Serialized estimator, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Linear(LinearModel),
    Pipeline(PipelineSpec),
    Onnx(OnnxSpec),
}

/// Reference to an ONNX graph stored next to the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnnxSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl ModelSpec {
    /// Build a predictor; relative paths resolve against `base_dir`
    pub fn build(self, base_dir: &Path) -> Result<Box<dyn Predictor>> {
        match self {
            ModelSpec::Linear(model) => {
                model.validate()?;
                Ok(Box::new(model))
            }
            ModelSpec::Pipeline(spec) => Ok(Box::new(Pipeline::build(spec, base_dir)?)),
            ModelSpec::Onnx(spec) => Ok(Box::new(OnnxPredictor::from_spec(spec, base_dir)?)),
        }
    }
}
