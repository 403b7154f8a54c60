/// Feature vectors for the two level regressors.
///
/// Both models were trained on wall-clock time at the monitored site, so
/// callers pass a `DateTime<FixedOffset>` in the site's offset rather than
/// UTC.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

/// Column layout of the seasonal (expected level) model.
pub const SEASONAL_FEATURES: &[&str] = &["HOUR", "DAY_OF_YEAR", "DAY_OF_WEEK"];

/// Column layout of the rainfall-adjusted model.
pub const RAIN_ADJUSTED_FEATURES: &[&str] = &["CHUVA_MM", "HOUR", "DAY_OF_YEAR", "DAY_OF_WEEK"];

/// An ordered row of model inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    /// `(hour 0-23, day_of_year 1-366, day_of_week 0-6 with Monday = 0)`
    pub fn seasonal(at: &DateTime<FixedOffset>) -> Self {
        FeatureVector(calendar_features(at).to_vec())
    }

    /// `(rainfall_mm, hour, day_of_year, day_of_week)`
    pub fn rain_adjusted(rainfall_mm: f64, at: &DateTime<FixedOffset>) -> Self {
        let mut values = Vec::with_capacity(RAIN_ADJUSTED_FEATURES.len());
        values.push(rainfall_mm);
        values.extend_from_slice(&calendar_features(at));
        FeatureVector(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn calendar_features(at: &DateTime<FixedOffset>) -> [f64; 3] {
    [
        at.hour() as f64,
        at.ordinal() as f64,
        at.weekday().num_days_from_monday() as f64,
    ]
}
