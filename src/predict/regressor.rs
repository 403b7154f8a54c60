/// Pre-trained linear regressors stored as JSON.
///
/// ```json
/// {
///   "feature_names": ["HOUR", "DAY_OF_YEAR", "DAY_OF_WEEK"],
///   "coefficients": [0.0012, -0.0003, 0.0001],
///   "intercept": 716.8
/// }
/// ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::features::FeatureVector;
use crate::model::{InferenceError, ModelError};

/// A model that maps a feature vector to a river level.
pub trait Regressor {
    fn predict(&self, features: &FeatureVector) -> Result<f64, InferenceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    /// Parse a model document and check it against the expected column
    /// layout.
    pub fn from_json(json: &str, layout: &[&str]) -> Result<Self, ModelError> {
        let model: LinearRegressor =
            serde_json::from_str(json).map_err(|e| ModelError::Invalid(e.to_string()))?;
        model.check_layout(layout)?;
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>, layout: &[&str]) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ModelError::NotFound(path.display().to_string()),
            _ => ModelError::Invalid(format!("{}: {}", path.display(), e)),
        })?;
        Self::from_json(&json, layout)
    }

    fn check_layout(&self, layout: &[&str]) -> Result<(), ModelError> {
        if self.coefficients.len() != self.feature_names.len() {
            return Err(ModelError::Invalid(format!(
                "{} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if !self.feature_names.iter().map(String::as_str).eq(layout.iter().copied()) {
            return Err(ModelError::Invalid(format!(
                "feature layout {:?} does not match expected {:?}",
                self.feature_names, layout
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Invalid("non-finite parameter".to_string()));
        }
        Ok(())
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        if features.len() != self.coefficients.len() {
            return Err(InferenceError::FeatureMismatch {
                expected: self.coefficients.len(),
                got: features.len(),
            });
        }
        let value = self.intercept
            + self
                .coefficients
                .iter()
                .zip(features.values())
                .map(|(c, x)| c * x)
                .sum::<f64>();
        if value.is_finite() {
            Ok(value)
        } else {
            Err(InferenceError::NonFinite)
        }
    }
}
