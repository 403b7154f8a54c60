/// SMS alert deduplication.
///
/// One alert may be sent per distinct combination of current level,
/// predicted level and rainfall. The gate is a small state machine owned by
/// the session:
///
/// ```text
///   Idle ──severe──▶ Armed ──send ok──▶ Sent
///    ▲                 ▲                  │
///    └─ not severe ────┤◀── new fingerprint / reset
/// ```
///
/// The last sent fingerprint outlives `Idle`: when severe conditions return
/// with the same readings the gate goes straight back to `Sent`. Only a
/// reset forgets it.
///
/// A failed send leaves the gate `Armed`. There is no automatic retry: the
/// operator re-triggers by hand.

use crate::logging::{self, Component};
use crate::model::{LevelSnapshot, RiskTier, SendError};

use super::sms::SmsGateway;

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Dedup key for one set of alert conditions.
///
/// Compared bit-for-bit, so two fingerprints are equal exactly when the
/// three readings are the same floats.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprint {
    pub current_m: f64,
    pub predicted_m: f64,
    pub rainfall_mm: f64,
}

impl Fingerprint {
    pub fn new(current_m: f64, predicted_m: f64, rainfall_mm: f64) -> Self {
        Fingerprint { current_m, predicted_m, rainfall_mm }
    }

    fn key(&self) -> [u64; 3] {
        [
            self.current_m.to_bits(),
            self.predicted_m.to_bits(),
            self.rainfall_mm.to_bits(),
        ]
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Fingerprint {}

impl From<&LevelSnapshot> for Fingerprint {
    fn from(s: &LevelSnapshot) -> Self {
        Fingerprint::new(s.current_m, s.predicted_m, s.rainfall_mm)
    }
}

// ---------------------------------------------------------------------------
// Alert state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    /// Risk is not severe; nothing is offered.
    Idle,
    /// Severe risk; a send is offered for the fingerprint.
    Armed(Fingerprint),
    /// A send for the fingerprint was accepted by the gateway.
    Sent(Fingerprint),
}

/// Outcome of a user-triggered send.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Sent,
    /// The gate was not offering a send; nothing was attempted.
    NotOffered,
    Failed(SendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertState {
    phase: AlertPhase,
    last_sent: Option<Fingerprint>,
}

impl Default for AlertState {
    fn default() -> Self {
        AlertState { phase: AlertPhase::Idle, last_sent: None }
    }
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> AlertPhase {
        self.phase
    }

    /// Feed the result of one evaluation into the gate.
    pub fn observe(&mut self, tier: RiskTier, fingerprint: Fingerprint) {
        if tier != RiskTier::Severe {
            self.phase = AlertPhase::Idle;
            return;
        }
        self.phase = match (self.phase, self.last_sent) {
            (_, Some(sent)) if sent == fingerprint => AlertPhase::Sent(sent),
            (AlertPhase::Sent(_), _) => {
                logging::info(Component::Alert, "Conditions changed since last SMS; alert re-armed");
                AlertPhase::Armed(fingerprint)
            }
            _ => AlertPhase::Armed(fingerprint),
        };
    }

    /// Fingerprint of the last accepted send, kept until a reset.
    pub fn last_sent(&self) -> Option<Fingerprint> {
        self.last_sent
    }

    /// Whether a send should be offered for `fingerprint`.
    pub fn should_offer_send(&self, fingerprint: &Fingerprint) -> bool {
        match self.phase {
            AlertPhase::Idle => false,
            AlertPhase::Armed(_) => true,
            AlertPhase::Sent(sent) => sent != *fingerprint,
        }
    }

    /// Record a successful send for `fingerprint`.
    pub fn mark_sent(&mut self, fingerprint: Fingerprint) {
        self.phase = AlertPhase::Sent(fingerprint);
        self.last_sent = Some(fingerprint);
    }

    /// Allow another send for the same conditions.
    pub fn reset(&mut self) {
        if self.last_sent.take().is_some() {
            logging::info(Component::Alert, "SMS status reset by operator");
        }
        if let AlertPhase::Sent(fingerprint) = self.phase {
            self.phase = AlertPhase::Armed(fingerprint);
        }
    }

    /// Send `message` if the gate is offering a send for `fingerprint`.
    /// Only a gateway success moves the gate to `Sent`.
    pub fn dispatch(
        &mut self,
        gateway: &dyn SmsGateway,
        fingerprint: Fingerprint,
        message: &str,
    ) -> DispatchOutcome {
        if !self.should_offer_send(&fingerprint) {
            return DispatchOutcome::NotOffered;
        }
        match gateway.send(message) {
            Ok(()) => {
                logging::info(Component::Alert, "SMS alert accepted for delivery");
                self.mark_sent(fingerprint);
                DispatchOutcome::Sent
            }
            Err(e) => {
                logging::error(Component::Alert, &format!("SMS send failed: {}", e));
                DispatchOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct RecordingGateway {
        accept: Cell<bool>,
        sent: RefCell<Vec<String>>,
    }

    impl RecordingGateway {
        fn new(accept: bool) -> Self {
            RecordingGateway { accept: Cell::new(accept), sent: RefCell::new(Vec::new()) }
        }
    }

    impl SmsGateway for RecordingGateway {
        fn send(&self, message: &str) -> Result<(), SendError> {
            self.sent.borrow_mut().push(message.to_string());
            if self.accept.get() {
                Ok(())
            } else {
                Err(SendError::HttpError(502))
            }
        }
    }

    fn fp() -> Fingerprint {
        Fingerprint::new(720.5, 721.0, 50.0)
    }

    fn armed() -> AlertState {
        let mut state = AlertState::new();
        state.observe(RiskTier::Severe, fp());
        state
    }

    #[test]
    fn test_new_state_is_idle_and_offers_nothing() {
        let state = AlertState::new();
        assert_eq!(state.phase(), AlertPhase::Idle);
        assert!(!state.should_offer_send(&fp()));
    }

    #[test]
    fn test_severe_arms_the_gate() {
        let state = armed();
        assert_eq!(state.phase(), AlertPhase::Armed(fp()));
        assert!(state.should_offer_send(&fp()));
    }

    #[test]
    fn test_non_severe_tiers_leave_gate_idle() {
        let mut state = armed();
        state.observe(RiskTier::Moderate, fp());
        assert_eq!(state.phase(), AlertPhase::Idle);
        state.observe(RiskTier::Minimal, fp());
        assert_eq!(state.phase(), AlertPhase::Idle);
    }

    #[test]
    fn test_mark_sent_suppresses_same_fingerprint() {
        let mut state = armed();
        state.mark_sent(fp());
        assert!(!state.should_offer_send(&fp()));

        state.observe(RiskTier::Severe, fp());
        assert_eq!(state.phase(), AlertPhase::Sent(fp()));
        assert!(!state.should_offer_send(&fp()));
    }

    #[test]
    fn test_sent_conditions_stay_suppressed_after_leaving_severe() {
        let mut state = armed();
        state.mark_sent(fp());

        state.observe(RiskTier::Moderate, fp());
        assert_eq!(state.phase(), AlertPhase::Idle);
        assert_eq!(state.last_sent(), Some(fp()));

        state.observe(RiskTier::Severe, fp());
        assert_eq!(state.phase(), AlertPhase::Sent(fp()));
        assert!(!state.should_offer_send(&fp()));
    }

    #[test]
    fn test_returning_to_sent_conditions_after_other_severe_readings() {
        let other = Fingerprint::new(721.5, 722.0, 50.0);
        let mut state = armed();
        state.mark_sent(fp());

        state.observe(RiskTier::Severe, other);
        assert!(state.should_offer_send(&other));
        state.observe(RiskTier::Severe, fp());
        assert!(!state.should_offer_send(&fp()));
    }

    #[test]
    fn test_reset_while_idle_forgets_the_sent_conditions() {
        let mut state = armed();
        state.mark_sent(fp());
        state.observe(RiskTier::Minimal, fp());
        state.reset();
        assert_eq!(state.last_sent(), None);

        state.observe(RiskTier::Severe, fp());
        assert_eq!(state.phase(), AlertPhase::Armed(fp()));
    }

    #[test]
    fn test_any_changed_input_reopens_the_gate() {
        let changed = [
            Fingerprint::new(720.6, 721.0, 50.0),
            Fingerprint::new(720.5, 721.1, 50.0),
            Fingerprint::new(720.5, 721.0, 50.5),
        ];
        for next in changed {
            let mut state = armed();
            state.mark_sent(fp());
            assert!(state.should_offer_send(&next));

            state.observe(RiskTier::Severe, next);
            assert_eq!(state.phase(), AlertPhase::Armed(next));
            assert!(state.should_offer_send(&next));
        }
    }

    #[test]
    fn test_reset_rearms_for_same_conditions() {
        let mut state = armed();
        state.mark_sent(fp());
        state.reset();
        assert_eq!(state.phase(), AlertPhase::Armed(fp()));
        assert!(state.should_offer_send(&fp()));

        state.observe(RiskTier::Severe, fp());
        assert_eq!(state.phase(), AlertPhase::Armed(fp()));
    }

    #[test]
    fn test_reset_outside_sent_is_a_no_op() {
        let mut idle = AlertState::new();
        idle.reset();
        assert_eq!(idle.phase(), AlertPhase::Idle);

        let mut state = armed();
        state.reset();
        assert_eq!(state.phase(), AlertPhase::Armed(fp()));
    }

    #[test]
    fn test_successful_dispatch_moves_to_sent() {
        let gateway = RecordingGateway::new(true);
        let mut state = armed();
        assert_eq!(state.dispatch(&gateway, fp(), "alert"), DispatchOutcome::Sent);
        assert_eq!(state.phase(), AlertPhase::Sent(fp()));
        assert_eq!(gateway.sent.borrow().as_slice(), ["alert"]);
    }

    #[test]
    fn test_second_dispatch_for_same_conditions_is_not_offered() {
        let gateway = RecordingGateway::new(true);
        let mut state = armed();
        state.dispatch(&gateway, fp(), "alert");
        assert_eq!(state.dispatch(&gateway, fp(), "alert"), DispatchOutcome::NotOffered);
        assert_eq!(gateway.sent.borrow().len(), 1);
    }

    #[test]
    fn test_failed_dispatch_stays_armed_and_can_be_retried_by_hand() {
        let gateway = RecordingGateway::new(false);
        let mut state = armed();
        assert_eq!(
            state.dispatch(&gateway, fp(), "alert"),
            DispatchOutcome::Failed(SendError::HttpError(502))
        );
        assert_eq!(state.phase(), AlertPhase::Armed(fp()));
        assert!(state.should_offer_send(&fp()));
        assert_eq!(gateway.sent.borrow().len(), 1, "no automatic retry");

        gateway.accept.set(true);
        assert_eq!(state.dispatch(&gateway, fp(), "alert"), DispatchOutcome::Sent);
    }

    #[test]
    fn test_idle_dispatch_sends_nothing() {
        let gateway = RecordingGateway::new(true);
        let mut state = AlertState::new();
        assert_eq!(state.dispatch(&gateway, fp(), "alert"), DispatchOutcome::NotOffered);
        assert!(gateway.sent.borrow().is_empty());
    }

    #[test]
    fn test_fingerprint_equality_is_structural() {
        assert_eq!(Fingerprint::new(1.0, 2.0, 3.0), Fingerprint::new(1.0, 2.0, 3.0));
        assert_ne!(Fingerprint::new(0.0, 2.0, 3.0), Fingerprint::new(-0.0, 2.0, 3.0));
        let nan = Fingerprint::new(f64::NAN, 2.0, 3.0);
        assert_eq!(nan, nan);
    }
}
