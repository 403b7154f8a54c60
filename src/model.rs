/// Reading, Thresholds, RiskTier, RiskAssessment and the error taxonomy.
///
/// Core data types for the flood risk monitor.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O and no external dependencies beyond chrono, only types
/// and the small amount of logic that belongs to them (floors, display).

use chrono::{DateTime, Utc};
use std::fmt;

// ---------------------------------------------------------------------------
// Reading floors
// ---------------------------------------------------------------------------

/// Lowest river level the monitor will report, in metres. Also used as the
/// substitute value when the river gauge cannot be reached.
pub const RIVER_LEVEL_FLOOR_M: f64 = 715.0;

/// Lowest rainfall volume the monitor will report, in millimetres.
pub const RAIN_VOLUME_FLOOR_MM: f64 = 0.0;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// Which sensor a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadingKind {
    /// River level, metres.
    River,
    /// Rainfall volume over the current day, millimetres.
    Rain,
}

impl ReadingKind {
    /// The minimum value a reading of this kind may take.
    pub fn floor(self) -> f64 {
        match self {
            ReadingKind::River => RIVER_LEVEL_FLOOR_M,
            ReadingKind::Rain => RAIN_VOLUME_FLOOR_MM,
        }
    }

    /// Tag stored alongside persisted readings.
    pub fn as_str(self) -> &'static str {
        match self {
            ReadingKind::River => "RIVER",
            ReadingKind::Rain => "RAIN",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            ReadingKind::River => "m",
            ReadingKind::Rain => "mm",
        }
    }
}

impl fmt::Display for ReadingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the value of a reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingOrigin {
    /// Returned by the remote source.
    Fetched,
    /// The source failed; the floor value was substituted.
    Fallback,
    /// Entered by the operator.
    Manual,
}

/// A single scalar measurement, already clamped to its kind's floor.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub kind: ReadingKind,
    pub value: f64,
    pub origin: ReadingOrigin,
    pub taken_at: DateTime<Utc>,
}

impl Reading {
    /// Builds a reading, raising `value` to the kind's floor if it falls
    /// below it. Negative zero comes out as `0.0`.
    pub fn clamped(kind: ReadingKind, value: f64, origin: ReadingOrigin, taken_at: DateTime<Utc>) -> Self {
        Reading {
            kind,
            value: value.max(kind.floor()) + 0.0,
            origin,
            taken_at,
        }
    }

    /// The reading used when the source is unavailable.
    pub fn fallback(kind: ReadingKind, taken_at: DateTime<Utc>) -> Self {
        Reading {
            kind,
            value: kind.floor(),
            origin: ReadingOrigin::Fallback,
            taken_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Operator-configured river levels, in metres.
///
/// `moderate < severe` is expected but not enforced; the classifier checks
/// the severe threshold first, so an inverted pair simply makes the
/// moderate tier unreachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub moderate_m: f64,
    pub severe_m: f64,
}

impl Thresholds {
    pub fn is_ordered(&self) -> bool {
        self.moderate_m < self.severe_m
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            moderate_m: 718.0,
            severe_m: 720.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Risk types
// ---------------------------------------------------------------------------

/// Flood risk tiers, in ascending order of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskTier {
    Minimal,
    Moderate,
    Severe,
}

impl RiskTier {
    /// Display color used for the tier on the dashboard.
    pub fn color(self) -> &'static str {
        match self {
            RiskTier::Minimal => "green",
            RiskTier::Moderate => "orange",
            RiskTier::Severe => "red",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Minimal => write!(f, "MINIMAL"),
            RiskTier::Moderate => write!(f, "MODERATE"),
            RiskTier::Severe => write!(f, "SEVERE"),
        }
    }
}

/// Result of classifying one set of levels against the thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub color: &'static str,
    /// Which level crossed which threshold. Empty for `Minimal`.
    pub rationale: String,
}

/// The three levels shown side by side on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSnapshot {
    pub expected_m: f64,
    pub current_m: f64,
    pub predicted_m: f64,
    pub rainfall_mm: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching a reading from a remote source.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Non-2xx HTTP response from the source.
    HttpError(u16),
    /// The request never produced a response (DNS, connect, timeout).
    Transport(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The response parsed but contained no usable item.
    NoDataAvailable(ReadingKind),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::HttpError(code) => write!(f, "HTTP error: {}", code),
            FetchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            FetchError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            FetchError::NoDataAvailable(kind) => write!(f, "No data available for {} reading", kind),
        }
    }
}

impl std::error::Error for FetchError {}

/// Errors raised while loading a regression model from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    NotFound(String),
    Invalid(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::NotFound(path) => write!(f, "Model file not found: {}", path),
            ModelError::Invalid(msg) => write!(f, "Invalid model: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Errors raised by a loaded model while predicting.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceError {
    /// The feature vector has a different length than the model expects.
    FeatureMismatch { expected: usize, got: usize },
    /// The model produced NaN or infinity.
    NonFinite,
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceError::FeatureMismatch { expected, got } => {
                write!(f, "Feature mismatch: model expects {} features, got {}", expected, got)
            }
            InferenceError::NonFinite => write!(f, "Model produced a non-finite prediction"),
        }
    }
}

impl std::error::Error for InferenceError {}

/// Errors reported by the SMS transport.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// No SMS endpoint or recipients configured.
    NotConfigured,
    HttpError(u16),
    Transport(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::NotConfigured => write!(f, "SMS gateway is not configured"),
            SendError::HttpError(code) => write!(f, "SMS gateway HTTP error: {}", code),
            SendError::Transport(msg) => write!(f, "SMS gateway unreachable: {}", msg),
        }
    }
}

impl std::error::Error for SendError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn test_river_reading_below_floor_is_raised_to_floor() {
        let reading = Reading::clamped(ReadingKind::River, 12.3, ReadingOrigin::Fetched, now());
        assert_eq!(reading.value, 715.0);
    }

    #[test]
    fn test_rain_reading_negative_is_raised_to_zero() {
        let reading = Reading::clamped(ReadingKind::Rain, -4.0, ReadingOrigin::Fetched, now());
        assert_eq!(reading.value, 0.0);
    }

    #[test]
    fn test_negative_zero_rain_is_stored_as_positive_zero() {
        let reading = Reading::clamped(ReadingKind::Rain, -0.0, ReadingOrigin::Fetched, now());
        assert_eq!(reading.value.to_bits(), 0.0f64.to_bits());
        assert!(reading.value.is_sign_positive());
    }

    #[test]
    fn test_reading_above_floor_is_untouched() {
        let reading = Reading::clamped(ReadingKind::River, 719.25, ReadingOrigin::Manual, now());
        assert_eq!(reading.value, 719.25);
        assert_eq!(reading.origin, ReadingOrigin::Manual);
    }

    #[test]
    fn test_fallback_reading_uses_floor() {
        assert_eq!(Reading::fallback(ReadingKind::River, now()).value, RIVER_LEVEL_FLOOR_M);
        assert_eq!(Reading::fallback(ReadingKind::Rain, now()).value, RAIN_VOLUME_FLOOR_MM);
    }

    #[test]
    fn test_tier_ordering_and_colors() {
        assert!(RiskTier::Minimal < RiskTier::Moderate);
        assert!(RiskTier::Moderate < RiskTier::Severe);
        assert_eq!(RiskTier::Severe.color(), "red");
        assert_eq!(RiskTier::Minimal.color(), "green");
    }

    #[test]
    fn test_default_thresholds_are_ordered() {
        assert!(Thresholds::default().is_ordered());
    }

    #[test]
    fn test_fetch_error_messages_match_failure_classifier_patterns() {
        // logging::classify_fetch_failure keys off these prefixes.
        assert!(FetchError::HttpError(503).to_string().starts_with("HTTP error"));
        assert!(FetchError::ParseError("x".into()).to_string().starts_with("Parse error"));
        assert!(FetchError::NoDataAvailable(ReadingKind::Rain).to_string().contains("No data"));
    }
}
