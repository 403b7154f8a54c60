//! Flood risk threshold checking.
//!
//! The current and rain-adjusted predicted levels are compared against the
//! operator thresholds. The seasonal expected level is shown next to them
//! on the dashboard as a baseline but never takes part in the comparison.

use crate::model::{RiskAssessment, RiskTier, Thresholds};

/// Classify the current and predicted river levels.
///
/// Severe is checked before moderate, so each level is reported against the
/// highest threshold it reaches. All inputs are expected to be finite.
pub fn classify(
    current_m: f64,
    _expected_m: f64,
    predicted_m: f64,
    thresholds: &Thresholds,
) -> RiskAssessment {
    let severe = crossings(current_m, predicted_m, thresholds.severe_m);
    if !severe.is_empty() {
        return assessment(RiskTier::Severe, rationale(&severe, "severe", thresholds.severe_m));
    }

    let moderate = crossings(current_m, predicted_m, thresholds.moderate_m);
    if !moderate.is_empty() {
        return assessment(
            RiskTier::Moderate,
            rationale(&moderate, "moderate", thresholds.moderate_m),
        );
    }

    assessment(RiskTier::Minimal, String::new())
}

fn assessment(tier: RiskTier, rationale: String) -> RiskAssessment {
    RiskAssessment {
        tier,
        color: tier.color(),
        rationale,
    }
}

fn crossings(current_m: f64, predicted_m: f64, limit_m: f64) -> Vec<(&'static str, f64)> {
    [("Current level", current_m), ("Predicted level", predicted_m)]
        .into_iter()
        .filter(|&(_, level)| level >= limit_m)
        .collect()
}

fn rationale(crossed: &[(&'static str, f64)], tier_name: &str, limit_m: f64) -> String {
    let parts: Vec<String> = crossed
        .iter()
        .map(|(label, level)| format!("{} ({:.2} m)", label, level))
        .collect();
    let verb = if parts.len() > 1 { "have" } else { "has" };
    format!(
        "{} {} reached the {} threshold ({:.2} m).",
        parts.join(" and "),
        verb,
        tier_name,
        limit_m
    )
}
