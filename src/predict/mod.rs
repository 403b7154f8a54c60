/// Level prediction with guarded fallbacks.
///
/// Two independent regressors feed the dashboard:
/// - the seasonal model gives the level normally expected at this hour and
///   day of the year;
/// - the rainfall model gives the level expected after today's rain.
///
/// Either may be missing (file absent, invalid) or fail during inference.
/// Neither case reaches the caller: a deterministic substitute is used and
/// the failure is logged at warning level and returned as a notice.
///
/// Submodules:
/// - `features` — calendar and rainfall feature vectors.
/// - `regressor` — the `Regressor` trait and the JSON linear model.

pub mod features;
pub mod regressor;

use chrono::{DateTime, FixedOffset};

use crate::config::ModelConfig;
use crate::logging::{self, Component};
use features::{FeatureVector, RAIN_ADJUSTED_FEATURES, SEASONAL_FEATURES};
pub use regressor::{LinearRegressor, Regressor};

/// Expected level reported when the seasonal model is unavailable.
pub const DEFAULT_EXPECTED_LEVEL_M: f64 = 2.0;

/// Metres of rise per millimetre of rain in the linear fallback.
pub const RAIN_RISE_M_PER_MM: f64 = 0.01;

/// The rainfall fallback: `current_level + rainfall_mm * 0.01`.
pub fn linear_rain_adjusted_level(current_level_m: f64, rainfall_mm: f64) -> f64 {
    current_level_m + rainfall_mm * RAIN_RISE_M_PER_MM
}

/// A predicted level, and the reason a fallback was used if one was.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub value_m: f64,
    pub fallback_notice: Option<String>,
}

impl Prediction {
    fn modelled(value_m: f64) -> Self {
        Prediction { value_m, fallback_notice: None }
    }

    fn fallback(value_m: f64, notice: String) -> Self {
        logging::warn(Component::Model, &notice);
        Prediction { value_m, fallback_notice: Some(notice) }
    }

    pub fn used_fallback(&self) -> bool {
        self.fallback_notice.is_some()
    }
}

/// Seasonal expected level, or `DEFAULT_EXPECTED_LEVEL_M`.
pub fn predict_expected_level(
    model: Option<&dyn Regressor>,
    at: &DateTime<FixedOffset>,
) -> Prediction {
    let Some(model) = model else {
        return Prediction::fallback(
            DEFAULT_EXPECTED_LEVEL_M,
            "Expected-level model not loaded. Using default value.".to_string(),
        );
    };
    match model.predict(&FeatureVector::seasonal(at)) {
        Ok(value) => Prediction::modelled(value),
        Err(e) => Prediction::fallback(
            DEFAULT_EXPECTED_LEVEL_M,
            format!("Expected-level prediction failed: {}. Using default value.", e),
        ),
    }
}

/// Rainfall-adjusted level, or the linear fallback.
pub fn predict_rain_adjusted_level(
    model: Option<&dyn Regressor>,
    current_level_m: f64,
    rainfall_mm: f64,
    at: &DateTime<FixedOffset>,
) -> Prediction {
    let fallback_value = linear_rain_adjusted_level(current_level_m, rainfall_mm);
    let Some(model) = model else {
        return Prediction::fallback(
            fallback_value,
            "Rainfall model not loaded. Using simplified calculation.".to_string(),
        );
    };
    match model.predict(&FeatureVector::rain_adjusted(rainfall_mm, at)) {
        Ok(value) => Prediction::modelled(value),
        Err(e) => Prediction::fallback(
            fallback_value,
            format!("Rainfall prediction failed: {}. Using simplified calculation.", e),
        ),
    }
}

// ---------------------------------------------------------------------------
// Prediction service
// ---------------------------------------------------------------------------

/// Holds whichever of the two models could be loaded.
#[derive(Default)]
pub struct PredictionService {
    expected: Option<Box<dyn Regressor>>,
    rain_adjusted: Option<Box<dyn Regressor>>,
}

impl PredictionService {
    pub fn new(
        expected: Option<Box<dyn Regressor>>,
        rain_adjusted: Option<Box<dyn Regressor>>,
    ) -> Self {
        PredictionService { expected, rain_adjusted }
    }

    /// Load both models from disk. A model that fails to load is logged and
    /// left absent; this never fails.
    pub fn load(config: &ModelConfig) -> Self {
        let expected = load_or_log(&config.expected_level_path, SEASONAL_FEATURES);
        let rain_adjusted = load_or_log(&config.rain_adjusted_path, RAIN_ADJUSTED_FEATURES);
        PredictionService::new(expected, rain_adjusted)
    }

    pub fn has_expected_model(&self) -> bool {
        self.expected.is_some()
    }

    pub fn has_rain_model(&self) -> bool {
        self.rain_adjusted.is_some()
    }

    pub fn expected_level(&self, at: &DateTime<FixedOffset>) -> Prediction {
        predict_expected_level(self.expected.as_deref(), at)
    }

    pub fn rain_adjusted_level(
        &self,
        current_level_m: f64,
        rainfall_mm: f64,
        at: &DateTime<FixedOffset>,
    ) -> Prediction {
        predict_rain_adjusted_level(self.rain_adjusted.as_deref(), current_level_m, rainfall_mm, at)
    }
}

fn load_or_log(path: &str, layout: &[&str]) -> Option<Box<dyn Regressor>> {
    match LinearRegressor::load(path, layout) {
        Ok(model) => {
            logging::info(Component::Model, &format!("Loaded model {}", path));
            Some(Box::new(model))
        }
        Err(e) => {
            logging::error(Component::Model, &format!("Error loading model: {}", e));
            None
        }
    }
}
