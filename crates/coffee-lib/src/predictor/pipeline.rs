//! Composite pipelines: transformation stages followed by an estimator

use super::{LinearModel, OnnxPredictor, OnnxSpec, Predictor, Transformer};
use crate::error::{PredictError, Result};
use crate::table::{Cell, FeatureFrame};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub steps: Vec<NamedStep>,
    /// Input column names recorded at fit time
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedStep {
    pub name: String,
    pub step: StepSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepSpec {
    OneHot(ColumnEncoder),
    StandardScaler(StandardScaler),
    Pipeline(PipelineSpec),
    Linear(LinearModel),
    Onnx(OnnxSpec),
}

/// One-hot encodes raw categorical columns, passing the rest through
///
/// Output columns are the passthrough columns followed by one indicator per
/// known category, named `<column>_<category>`. Unknown categories encode as
/// all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnEncoder {
    pub encode: Vec<EncodedColumn>,
    #[serde(default)]
    pub passthrough: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodedColumn {
    pub column: String,
    pub categories: Vec<String>,
}

impl Transformer for ColumnEncoder {
    fn transform(&self, features: &FeatureFrame) -> Result<FeatureFrame> {
        let passthrough = features.select(&self.passthrough)?;
        for enc in &self.encode {
            if !features.has_column(&enc.column) {
                return Err(PredictError::MissingColumns(enc.column.clone()));
            }
        }

        let mut columns = self.passthrough.clone();
        for enc in &self.encode {
            columns.extend(enc.categories.iter().map(|c| format!("{}_{}", enc.column, c)));
        }

        let mut out = FeatureFrame::new(columns);
        for (i, row_id) in features.row_ids().iter().enumerate() {
            let mut values = passthrough.rows()[i].clone();
            for enc in &self.encode {
                let value = features.get(i, &enc.column).and_then(Cell::as_text);
                values.extend(enc.categories.iter().map(|c| {
                    Cell::Float(if value.as_deref() == Some(c.as_str()) { 1.0 } else { 0.0 })
                }));
            }
            out.push(*row_id, values);
        }
        Ok(out)
    }

    fn encodes_columns(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "one_hot".to_string()
    }
}

/// Standardizes the named columns with fitted mean and scale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Transformer for StandardScaler {
    fn transform(&self, features: &FeatureFrame) -> Result<FeatureFrame> {
        if self.columns.len() != self.mean.len() || self.columns.len() != self.scale.len() {
            return Err(PredictError::Model(
                "standard scaler columns, mean and scale differ in length".to_string(),
            ));
        }
        let indices = self
            .columns
            .iter()
            .map(|c| {
                features
                    .column_index(c)
                    .ok_or_else(|| PredictError::MissingColumns(c.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = FeatureFrame::new(features.columns().to_vec());
        for (row_id, row) in features.row_ids().iter().zip(features.rows()) {
            let mut values = row.clone();
            for (k, &idx) in indices.iter().enumerate() {
                let scale = if self.scale[k] == 0.0 { 1.0 } else { self.scale[k] };
                values[idx] = match row[idx].as_f64() {
                    Some(x) => Cell::Float((x - self.mean[k]) / scale),
                    None => Cell::Null,
                };
            }
            out.push(*row_id, values);
        }
        Ok(out)
    }

    fn describe(&self) -> String {
        "standard_scaler".to_string()
    }
}

enum Stage {
    Transform(Box<dyn Transformer>),
    Nested(Pipeline),
    Estimator(Box<dyn Predictor>),
}

/// Ordered stages; only the last one may be an estimator
pub struct Pipeline {
    stages: Vec<(String, Stage)>,
    feature_names: Option<Vec<String>>,
    raw_columns: bool,
}

impl Pipeline {
    /// Build a pipeline that ends with an estimator
    pub fn build(spec: PipelineSpec, base_dir: &Path) -> Result<Self> {
        let pipeline = Self::build_stages(spec, base_dir)?;
        match pipeline.stages.last() {
            Some((_, Stage::Estimator(_))) => Ok(pipeline),
            Some((_, Stage::Nested(inner))) if inner.ends_with_estimator() => Ok(pipeline),
            _ => Err(PredictError::Model(
                "pipeline must end with an estimator".to_string(),
            )),
        }
    }

    fn build_stages(spec: PipelineSpec, base_dir: &Path) -> Result<Self> {
        if spec.steps.is_empty() {
            return Err(PredictError::Model("pipeline has no steps".to_string()));
        }
        let last = spec.steps.len() - 1;
        let mut stages = Vec::with_capacity(spec.steps.len());
        for (i, NamedStep { name, step }) in spec.steps.into_iter().enumerate() {
            let stage = match step {
                StepSpec::OneHot(encoder) => Stage::Transform(Box::new(encoder)),
                StepSpec::StandardScaler(scaler) => Stage::Transform(Box::new(scaler)),
                StepSpec::Pipeline(inner) => Stage::Nested(Self::build_stages(inner, base_dir)?),
                StepSpec::Linear(model) => {
                    model.validate()?;
                    Stage::Estimator(Box::new(model))
                }
                StepSpec::Onnx(onnx) => Stage::Estimator(Box::new(OnnxPredictor::from_spec(onnx, base_dir)?)),
            };
            if i != last {
                let ok = match &stage {
                    Stage::Estimator(_) => false,
                    Stage::Nested(inner) => !inner.ends_with_estimator(),
                    Stage::Transform(_) => true,
                };
                if !ok {
                    return Err(PredictError::Model(format!(
                        "pipeline step '{}' is an estimator but is not the last step",
                        name
                    )));
                }
            }
            stages.push((name, stage));
        }

        let raw_columns = stages.iter().any(|(_, stage)| match stage {
            Stage::Transform(t) => t.encodes_columns(),
            Stage::Nested(inner) => inner.raw_columns,
            Stage::Estimator(e) => e.expects_raw_columns(),
        });
        Ok(Self {
            stages,
            feature_names: spec.feature_names,
            raw_columns,
        })
    }

    fn ends_with_estimator(&self) -> bool {
        match self.stages.last() {
            Some((_, Stage::Estimator(_))) => true,
            Some((_, Stage::Nested(inner))) => inner.ends_with_estimator(),
            _ => false,
        }
    }

    fn transform(&self, features: &FeatureFrame) -> Result<FeatureFrame> {
        Self::apply(&self.stages, features)
    }

    fn apply(stages: &[(String, Stage)], features: &FeatureFrame) -> Result<FeatureFrame> {
        stages
            .iter()
            .try_fold(features.clone(), |frame, (name, stage)| match stage {
                Stage::Transform(t) => t.transform(&frame),
                Stage::Nested(inner) => inner.transform(&frame),
                Stage::Estimator(_) => Err(PredictError::Model(format!(
                    "step '{}' cannot transform features",
                    name
                ))),
            })
    }
}

impl Predictor for Pipeline {
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>> {
        let Some(((name, last), head)) = self.stages.split_last() else {
            return Err(PredictError::Model("pipeline has no steps".to_string()));
        };
        let frame = Self::apply(head, features)?;
        match last {
            Stage::Estimator(e) => e.predict(&frame),
            Stage::Nested(inner) => inner.predict(&frame),
            Stage::Transform(_) => Err(PredictError::Model(format!(
                "final step '{}' is not an estimator",
                name
            ))),
        }
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn expects_raw_columns(&self) -> bool {
        self.raw_columns
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self
            .stages
            .iter()
            .map(|(_, stage)| match stage {
                Stage::Transform(t) => t.describe(),
                Stage::Nested(inner) => inner.describe(),
                Stage::Estimator(e) => e.describe(),
            })
            .collect();
        format!("pipeline[{}]", parts.join(" -> "))
    }
}
