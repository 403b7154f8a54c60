/// Risk classification and SMS alerting.
///
/// Submodules:
/// - `thresholds` — maps current/predicted levels to a risk tier.
/// - `dispatch` — per-fingerprint SMS deduplication gate.
/// - `sms` — SMS transport and alert message text.

pub mod dispatch;
pub mod sms;
pub mod thresholds;

pub use dispatch::{AlertPhase, AlertState, DispatchOutcome, Fingerprint};
pub use sms::{compose_alert_message, gateway_from_config, DisabledGateway, HttpSmsGateway, SmsGateway};
pub use thresholds::classify;
