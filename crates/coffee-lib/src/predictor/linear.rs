//! Linear regression estimator (ordinary least squares, lasso, ridge)

use super::Predictor;
use crate::error::{PredictError, Result};
use crate::table::FeatureFrame;
use serde::{Deserialize, Serialize};

/// Fitted linear model: `intercept + Σ coefficient_i * x_i`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    /// Input column names in coefficient order; positional when absent
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LinearModel {
    pub fn new(feature_names: Option<Vec<String>>, coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            feature_names,
            coefficients,
            intercept,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(names) = &self.feature_names {
            if names.len() != self.coefficients.len() {
                return Err(PredictError::Model(format!(
                    "linear model has {} feature names but {} coefficients",
                    names.len(),
                    self.coefficients.len()
                )));
            }
        }
        Ok(())
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>> {
        let input = match &self.feature_names {
            Some(names) => features.select(names)?,
            None => features.clone(),
        };
        if input.columns().len() != self.coefficients.len() {
            return Err(PredictError::Model(format!(
                "linear model expects {} features, got {}",
                self.coefficients.len(),
                input.columns().len()
            )));
        }

        let matrix = input.to_matrix()?;
        Ok(matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&self.coefficients)
                    .fold(self.intercept, |acc, (x, w)| acc + x * w)
            })
            .collect())
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn describe(&self) -> String {
        format!("linear({} features)", self.coefficients.len())
    }
}
