/// Dashboard evaluation session.
///
/// A `Session` owns everything that survives between evaluations: the two
/// latest readings, the operator thresholds and the SMS alert gate. Every
/// external event (refresh tick, manual override, threshold change, send,
/// reset) mutates the session and is followed by one `evaluate` call that
/// produces a self-contained `Evaluation` for rendering.
///
/// Sessions are driven by a single loop; nothing here is shared across
/// threads.

use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;

use crate::alert::{classify, compose_alert_message, AlertPhase, AlertState, DispatchOutcome, Fingerprint, SmsGateway};
use crate::db::{persist_reading, ReadingStore};
use crate::ingest::{acquire_reading, ReadingSource};
use crate::logging::{self, Component};
use crate::model::{LevelSnapshot, Reading, ReadingKind, ReadingOrigin, RiskAssessment, RiskTier, Thresholds};
use crate::predict::PredictionService;

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidInput(pub String);

impl fmt::Display for InvalidInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid input: {}", self.0)
    }
}

impl std::error::Error for InvalidInput {}

fn require_finite(name: &str, value: f64) -> Result<f64, InvalidInput> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InvalidInput(format!("{} must be a finite number, got {}", name, value)))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Everything the dashboard needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub at: DateTime<FixedOffset>,
    pub levels: LevelSnapshot,
    pub thresholds: Thresholds,
    pub assessment: RiskAssessment,
    pub river_origin: ReadingOrigin,
    pub rain_origin: ReadingOrigin,
    pub alert_phase: AlertPhase,
    /// Whether the operator should be offered an SMS send.
    pub offer_send: bool,
    /// Alert text, present whenever the tier is severe.
    pub sms_message: Option<String>,
    /// Fetch and model fallbacks that applied to this evaluation.
    pub notices: Vec<String>,
}

impl Evaluation {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from(&self.levels)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct Session {
    city: String,
    thresholds: Thresholds,
    source: Box<dyn ReadingSource>,
    predictions: PredictionService,
    gateway: Box<dyn SmsGateway>,
    store: Box<dyn ReadingStore>,
    river: Reading,
    rain: Reading,
    fetch_notices: Vec<String>,
    alert: AlertState,
}

impl Session {
    /// Build a session and take the first readings from `source`.
    pub fn start(
        city: &str,
        thresholds: Thresholds,
        source: Box<dyn ReadingSource>,
        predictions: PredictionService,
        gateway: Box<dyn SmsGateway>,
        store: Box<dyn ReadingStore>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut session = Session {
            city: city.to_string(),
            thresholds,
            source,
            predictions,
            gateway,
            store,
            river: Reading::fallback(ReadingKind::River, now),
            rain: Reading::fallback(ReadingKind::Rain, now),
            fetch_notices: Vec::new(),
            alert: AlertState::new(),
        };
        session.refresh(now);
        session
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.alert
    }

    pub fn reading(&self, kind: ReadingKind) -> &Reading {
        match kind {
            ReadingKind::River => &self.river,
            ReadingKind::Rain => &self.rain,
        }
    }

    /// Re-fetch both readings, replacing any manual overrides.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.fetch_notices.clear();
        for kind in [ReadingKind::Rain, ReadingKind::River] {
            let acquisition = acquire_reading(self.source.as_ref(), kind, now);
            if let Some(notice) = acquisition.notice() {
                self.fetch_notices.push(notice);
            }
            match kind {
                ReadingKind::River => self.river = acquisition.reading,
                ReadingKind::Rain => self.rain = acquisition.reading,
            }
        }
    }

    /// Replace a reading with an operator-entered value. The value is
    /// clamped to the kind's floor and persisted.
    pub fn override_reading(
        &mut self,
        kind: ReadingKind,
        value: f64,
        now: DateTime<Utc>,
    ) -> Result<&Reading, InvalidInput> {
        let value = require_finite(kind.as_str(), value)?;
        let reading = Reading::clamped(kind, value, ReadingOrigin::Manual, now);
        persist_reading(self.store.as_mut(), &reading);
        logging::info(kind.into(), &format!("manual override: {} {}", reading.value, kind.unit()));
        let slot = match kind {
            ReadingKind::River => &mut self.river,
            ReadingKind::Rain => &mut self.rain,
        };
        *slot = reading;
        Ok(slot)
    }

    pub fn set_moderate_threshold(&mut self, value_m: f64) -> Result<(), InvalidInput> {
        self.thresholds.moderate_m = validate_threshold("moderate threshold", value_m)?;
        self.warn_if_inverted();
        Ok(())
    }

    pub fn set_severe_threshold(&mut self, value_m: f64) -> Result<(), InvalidInput> {
        self.thresholds.severe_m = validate_threshold("severe threshold", value_m)?;
        self.warn_if_inverted();
        Ok(())
    }

    fn warn_if_inverted(&self) {
        if !self.thresholds.is_ordered() {
            logging::warn(
                Component::System,
                &format!(
                    "moderate threshold ({:.2} m) is not below severe threshold ({:.2} m)",
                    self.thresholds.moderate_m, self.thresholds.severe_m
                ),
            );
        }
    }

    /// Run one evaluation cycle against the current readings.
    pub fn evaluate(&mut self, at: DateTime<FixedOffset>) -> Evaluation {
        let mut notices = self.fetch_notices.clone();

        let current_m = self.river.value;
        let rainfall_mm = self.rain.value;

        let expected = self.predictions.expected_level(&at);
        let predicted = self.predictions.rain_adjusted_level(current_m, rainfall_mm, &at);
        notices.extend(expected.fallback_notice.clone());
        notices.extend(predicted.fallback_notice.clone());

        let levels = LevelSnapshot {
            expected_m: expected.value_m,
            current_m,
            predicted_m: predicted.value_m,
            rainfall_mm,
        };
        let assessment = classify(current_m, levels.expected_m, levels.predicted_m, &self.thresholds);

        let fingerprint = Fingerprint::from(&levels);
        self.alert.observe(assessment.tier, fingerprint);

        let sms_message = (assessment.tier == RiskTier::Severe)
            .then(|| compose_alert_message(&self.city, &levels, &at));

        Evaluation {
            at,
            levels,
            thresholds: self.thresholds,
            assessment,
            river_origin: self.river.origin,
            rain_origin: self.rain.origin,
            alert_phase: self.alert.phase(),
            offer_send: self.alert.should_offer_send(&fingerprint),
            sms_message,
            notices,
        }
    }

    /// Operator pressed "send": evaluate the current conditions and, if a
    /// send is on offer, hand the alert to the gateway.
    pub fn send_alert(&mut self, at: DateTime<FixedOffset>) -> DispatchOutcome {
        let evaluation = self.evaluate(at);
        let Some(message) = evaluation.sms_message.as_deref() else {
            return DispatchOutcome::NotOffered;
        };
        self.alert
            .dispatch(self.gateway.as_ref(), evaluation.fingerprint(), message)
    }

    /// Operator pressed "reset": allow another send for the same conditions.
    pub fn reset_alert(&mut self) {
        self.alert.reset();
    }
}

fn validate_threshold(name: &str, value_m: f64) -> Result<f64, InvalidInput> {
    let value_m = require_finite(name, value_m)?;
    if value_m < 0.0 {
        return Err(InvalidInput(format!("{} must be >= 0, got {}", name, value_m)));
    }
    Ok(value_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NullStore;
    use crate::model::{FetchError, SendError};
    use chrono::TimeZone;

    struct Fixed {
        river: Result<f64, FetchError>,
        rain: Result<f64, FetchError>,
    }

    impl ReadingSource for Fixed {
        fn fetch(&self, kind: ReadingKind) -> Result<f64, FetchError> {
            match kind {
                ReadingKind::River => self.river.clone(),
                ReadingKind::Rain => self.rain.clone(),
            }
        }
    }

    struct Accepting;

    impl SmsGateway for Accepting {
        fn send(&self, _message: &str) -> Result<(), SendError> {
            Ok(())
        }
    }

    fn utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap()
    }

    fn local() -> DateTime<FixedOffset> {
        utc().with_timezone(&FixedOffset::west_opt(3 * 3600).unwrap())
    }

    fn session(river: Result<f64, FetchError>, rain: Result<f64, FetchError>) -> Session {
        Session::start(
            "São Paulo",
            Thresholds::default(),
            Box::new(Fixed { river, rain }),
            PredictionService::default(),
            Box::new(Accepting),
            Box::new(NullStore),
            utc(),
        )
    }

    #[test]
    fn test_fetch_failures_fall_back_to_floors_with_notices() {
        let mut s = session(Err(FetchError::HttpError(500)), Err(FetchError::HttpError(500)));
        let eval = s.evaluate(local());
        assert_eq!(eval.levels.current_m, 715.0);
        assert_eq!(eval.levels.rainfall_mm, 0.0);
        assert_eq!(eval.river_origin, ReadingOrigin::Fallback);
        // two fetch notices + two model notices
        assert_eq!(eval.notices.len(), 4);
        assert_eq!(eval.assessment.tier, RiskTier::Minimal);
    }

    #[test]
    fn test_without_models_expected_is_default_and_predicted_is_linear() {
        let mut s = session(Ok(719.0), Ok(150.0));
        let eval = s.evaluate(local());
        assert_eq!(eval.levels.expected_m, 2.0);
        assert_eq!(eval.levels.predicted_m, 719.0 + 150.0 * 0.01);
        assert_eq!(eval.assessment.tier, RiskTier::Severe);
        assert!(eval.assessment.rationale.starts_with("Predicted level"));
    }

    #[test]
    fn test_severe_evaluation_offers_send_with_message() {
        let mut s = session(Ok(720.5), Ok(0.0));
        let eval = s.evaluate(local());
        assert!(eval.offer_send);
        assert!(eval.sms_message.unwrap().contains("Date: 01/05 14:00."));
    }

    #[test]
    fn test_send_then_reevaluate_is_not_offered_until_conditions_change() {
        let mut s = session(Ok(720.5), Ok(0.0));
        assert_eq!(s.send_alert(local()), DispatchOutcome::Sent);
        assert!(!s.evaluate(local()).offer_send);

        s.override_reading(ReadingKind::Rain, 5.0, utc()).unwrap();
        assert!(s.evaluate(local()).offer_send);
    }

    #[test]
    fn test_reset_reoffers_send() {
        let mut s = session(Ok(720.5), Ok(0.0));
        s.send_alert(local());
        s.reset_alert();
        assert!(s.evaluate(local()).offer_send);
    }

    #[test]
    fn test_send_without_severe_risk_is_not_offered() {
        let mut s = session(Ok(716.0), Ok(0.0));
        assert_eq!(s.send_alert(local()), DispatchOutcome::NotOffered);
    }

    #[test]
    fn test_override_is_clamped_and_marked_manual() {
        let mut s = session(Ok(716.0), Ok(0.0));
        let reading = s.override_reading(ReadingKind::River, 700.0, utc()).unwrap();
        assert_eq!(reading.value, 715.0);
        assert_eq!(reading.origin, ReadingOrigin::Manual);
    }

    #[test]
    fn test_non_finite_override_is_rejected() {
        let mut s = session(Ok(716.0), Ok(0.0));
        assert!(s.override_reading(ReadingKind::Rain, f64::NAN, utc()).is_err());
        assert_eq!(s.reading(ReadingKind::Rain).value, 0.0);
    }

    #[test]
    fn test_threshold_changes_apply_to_next_evaluation() {
        let mut s = session(Ok(716.0), Ok(0.0));
        assert_eq!(s.evaluate(local()).assessment.tier, RiskTier::Minimal);
        s.set_moderate_threshold(715.5).unwrap();
        assert_eq!(s.evaluate(local()).assessment.tier, RiskTier::Moderate);
        assert!(s.set_severe_threshold(-1.0).is_err());
        assert!(s.set_severe_threshold(f64::INFINITY).is_err());
    }

    #[test]
    fn test_identical_inputs_produce_identical_evaluations() {
        let mut s = session(Ok(718.5), Ok(10.0));
        let first = s.evaluate(local());
        let second = s.evaluate(local());
        assert_eq!(first, second);
    }

    #[test]
    fn test_refresh_replaces_manual_override() {
        let mut s = session(Ok(716.0), Ok(0.0));
        s.override_reading(ReadingKind::River, 722.0, utc()).unwrap();
        s.refresh(utc());
        assert_eq!(s.reading(ReadingKind::River).value, 716.0);
        assert_eq!(s.reading(ReadingKind::River).origin, ReadingOrigin::Fetched);
    }
}
