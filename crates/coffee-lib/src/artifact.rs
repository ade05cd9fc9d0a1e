//! Artifact loading
//!
//! An artifact is either a metadata bundle (a JSON object with a `model`
//! key plus target, feature and calibration metadata) or a bare estimator
//! (a JSON estimator spec, or an `.onnx` graph). Both shapes are resolved
//! here, once, into an [`ArtifactDescriptor`]; nothing downstream looks at
//! the raw file again.

use crate::error::{PredictError, Result};
use crate::predictor::{ModelSpec, OnnxPredictor, Predictor};
use crate::table::{COUNTRY, TYPE};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Target used when neither metadata nor file name says otherwise
pub const DEFAULT_TARGET: &str = "price";

/// Which of the two supported layouts the artifact used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactShape {
    MetadataBundle,
    BareEstimator,
}

impl ArtifactShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactShape::MetadataBundle => "metadata_bundle",
            ArtifactShape::BareEstimator => "bare_estimator",
        }
    }
}

/// Uniform view over a loaded artifact
pub struct ArtifactDescriptor {
    pub model: Box<dyn Predictor>,
    pub target_column: String,
    /// Declared input columns, in order; `None` means infer from the input
    pub expected_feature_columns: Option<Vec<String>>,
    pub grouping_columns: Vec<String>,
    pub interval80: Option<f64>,
    pub interval95: Option<f64>,
    /// The predictor wants raw year/country/type columns
    pub raw_columns: bool,
    pub shape: ArtifactShape,
    /// Hex SHA-256 of the artifact file
    pub checksum: String,
    pub path: PathBuf,
}

impl ArtifactDescriptor {
    /// Descriptor for an in-memory predictor, with bare-estimator defaults
    pub fn for_model(model: Box<dyn Predictor>, target_column: impl Into<String>) -> Self {
        let expected_feature_columns = model
            .feature_names()
            .filter(|c| !c.is_empty())
            .map(<[String]>::to_vec);
        let raw_columns = model.expects_raw_columns();
        Self {
            model,
            target_column: target_column.into(),
            expected_feature_columns,
            grouping_columns: default_group_cols(),
            interval80: None,
            interval95: None,
            raw_columns,
            shape: ArtifactShape::BareEstimator,
            checksum: String::new(),
            path: PathBuf::new(),
        }
    }

    pub fn with_intervals(mut self, interval80: Option<f64>, interval95: Option<f64>) -> Self {
        self.interval80 = interval80;
        self.interval95 = interval95;
        self
    }

}

impl fmt::Debug for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactDescriptor")
            .field("model", &self.model.describe())
            .field("target_column", &self.target_column)
            .field("expected_feature_columns", &self.expected_feature_columns)
            .field("grouping_columns", &self.grouping_columns)
            .field("interval80", &self.interval80)
            .field("interval95", &self.interval95)
            .field("raw_columns", &self.raw_columns)
            .field("shape", &self.shape)
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MetadataBundle {
    model: ModelSpec,
    #[serde(default = "default_target")]
    y_col: String,
    #[serde(default)]
    feat_cols: Option<Vec<String>>,
    #[serde(default = "default_group_cols")]
    group_cols: Vec<String>,
    #[serde(rename = "PI80_abs", default)]
    pi80_abs: Option<f64>,
    #[serde(rename = "PI95_abs", default)]
    pi95_abs: Option<f64>,
    /// Explicit capability declaration; overrides what the model reports
    #[serde(default)]
    raw_columns: Option<bool>,
}

fn default_target() -> String {
    DEFAULT_TARGET.to_string()
}

fn default_group_cols() -> Vec<String> {
    vec![COUNTRY.to_string(), TYPE.to_string()]
}

/// Infer the target column from an artifact file name
pub fn infer_target_from_filename(path: &Path) -> &'static str {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.contains("consum") {
        "consumption"
    } else if name.contains("profit") || name.contains("util") {
        "profit"
    } else {
        DEFAULT_TARGET
    }
}

/// Load an artifact and resolve it into a descriptor
pub fn load_artifact(path: &Path) -> Result<ArtifactDescriptor> {
    if !path.exists() {
        return Err(PredictError::not_found("artifact", path));
    }
    let bytes = std::fs::read(path)?;
    let checksum = hex::encode(Sha256::digest(&bytes));
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let is_onnx = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    let mut descriptor = if is_onnx {
        let model: Box<dyn Predictor> = Box::new(OnnxPredictor::load(path)?);
        bare(model, path)
    } else {
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| PredictError::artifact(path, format!("invalid JSON: {}", e)))?;
        let is_bundle = value.as_object().map(|o| o.contains_key("model")).unwrap_or(false);
        if is_bundle {
            let bundle: MetadataBundle = serde_json::from_value(value)
                .map_err(|e| PredictError::artifact(path, e))?;
            from_bundle(bundle, path, base_dir)?
        } else {
            let spec: ModelSpec = serde_json::from_value(value)
                .map_err(|e| PredictError::artifact(path, e))?;
            bare(spec.build(base_dir)?, path)
        }
    };
    descriptor.checksum = checksum;
    descriptor.path = path.to_path_buf();

    debug!(
        path = %path.display(),
        shape = descriptor.shape.as_str(),
        target = %descriptor.target_column,
        model = %descriptor.model.describe(),
        raw_columns = descriptor.raw_columns,
        checksum = %descriptor.checksum,
        "Loaded artifact"
    );
    Ok(descriptor)
}

fn bare(model: Box<dyn Predictor>, path: &Path) -> ArtifactDescriptor {
    ArtifactDescriptor::for_model(model, infer_target_from_filename(path))
}

fn from_bundle(bundle: MetadataBundle, path: &Path, base_dir: &Path) -> Result<ArtifactDescriptor> {
    for (name, width) in [("PI80_abs", bundle.pi80_abs), ("PI95_abs", bundle.pi95_abs)] {
        if let Some(w) = width {
            if !w.is_finite() || w < 0.0 {
                return Err(PredictError::artifact(
                    path,
                    format!("{} must be a non-negative number, got {}", name, w),
                ));
            }
        }
    }

    let model = bundle.model.build(base_dir)?;
    let raw_columns = bundle.raw_columns.unwrap_or_else(|| model.expects_raw_columns());
    Ok(ArtifactDescriptor {
        model,
        target_column: bundle.y_col,
        expected_feature_columns: bundle.feat_cols.filter(|c| !c.is_empty()),
        grouping_columns: bundle.group_cols,
        interval80: bundle.pi80_abs,
        interval95: bundle.pi95_abs,
        raw_columns,
        shape: ArtifactShape::MetadataBundle,
        checksum: String::new(),
        path: PathBuf::new(),
    })
}
