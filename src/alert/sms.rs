/// SMS alert transport and message text.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::time::Duration;

use crate::config::SmsConfig;
use crate::model::{LevelSnapshot, SendError};

/// Anything that can hand an alert message to an SMS provider.
pub trait SmsGateway {
    /// `Ok` means the provider accepted the message for delivery.
    fn send(&self, message: &str) -> Result<(), SendError>;
}

/// Gateway used when no SMS endpoint is configured.
pub struct DisabledGateway;

impl SmsGateway for DisabledGateway {
    fn send(&self, _message: &str) -> Result<(), SendError> {
        Err(SendError::NotConfigured)
    }
}

#[derive(Debug, Serialize)]
struct SmsRequest<'a> {
    to: &'a [String],
    message: &'a str,
}

/// Posts alerts as JSON to an HTTP SMS provider.
pub struct HttpSmsGateway {
    client: reqwest::blocking::Client,
    endpoint: String,
    recipients: Vec<String>,
    token: Option<String>,
}

impl HttpSmsGateway {
    pub fn new(
        endpoint: &str,
        recipients: Vec<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpSmsGateway {
            client,
            endpoint: endpoint.to_string(),
            recipients,
            token,
        })
    }
}

impl SmsGateway for HttpSmsGateway {
    fn send(&self, message: &str) -> Result<(), SendError> {
        if self.recipients.is_empty() {
            return Err(SendError::NotConfigured);
        }
        let mut request = self.client.post(&self.endpoint).json(&SmsRequest {
            to: &self.recipients,
            message,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .map_err(|e| SendError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SendError::HttpError(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Build the gateway described by the config, or `DisabledGateway` when no
/// endpoint is set.
pub fn gateway_from_config(
    config: &SmsConfig,
    token: Option<String>,
    timeout: Duration,
) -> Result<Box<dyn SmsGateway>, reqwest::Error> {
    match &config.endpoint {
        Some(endpoint) => Ok(Box::new(HttpSmsGateway::new(
            endpoint,
            config.recipients.clone(),
            token,
            timeout,
        )?)),
        None => Ok(Box::new(DisabledGateway)),
    }
}

/// The alert text sent for a severe assessment.
pub fn compose_alert_message(city: &str, levels: &LevelSnapshot, at: &DateTime<FixedOffset>) -> String {
    format!(
        "FLOOD ALERT {}: SEVERE risk. Current level: {:.2}m. \
         Predicted with {:.1}mm rain: {:.2}m. Seasonal expected: {:.2}m. Date: {}.",
        city.to_uppercase(),
        levels.current_m,
        levels.rainfall_mm,
        levels.predicted_m,
        levels.expected_m,
        at.format("%d/%m %H:%M"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_message_contents() {
        let levels = LevelSnapshot {
            expected_m: 716.8,
            current_m: 720.5,
            predicted_m: 721.004,
            rainfall_mm: 50.5,
        };
        let at = DateTime::parse_from_rfc3339("2024-05-01T14:07:00-03:00").unwrap();
        let msg = compose_alert_message("São Paulo", &levels, &at);
        assert_eq!(
            msg,
            "FLOOD ALERT SÃO PAULO: SEVERE risk. Current level: 720.50m. \
             Predicted with 50.5mm rain: 721.00m. Seasonal expected: 716.80m. Date: 01/05 14:07."
        );
    }

    #[test]
    fn test_whole_rainfall_keeps_one_decimal() {
        let levels = LevelSnapshot {
            expected_m: 716.8,
            current_m: 720.5,
            predicted_m: 721.0,
            rainfall_mm: 50.0,
        };
        let at = DateTime::parse_from_rfc3339("2024-05-01T14:07:00-03:00").unwrap();
        assert!(compose_alert_message("Recife", &levels, &at).contains("Predicted with 50.0mm rain"));
    }

    #[test]
    fn test_disabled_gateway_reports_not_configured() {
        assert_eq!(DisabledGateway.send("x"), Err(SendError::NotConfigured));
    }

    #[test]
    fn test_http_gateway_without_recipients_is_not_configured() {
        let gateway =
            HttpSmsGateway::new("http://127.0.0.1:9/send", Vec::new(), None, Duration::from_secs(1))
                .unwrap();
        assert_eq!(gateway.send("x"), Err(SendError::NotConfigured));
    }

    #[test]
    fn test_unreachable_gateway_is_transport_error() {
        // Port 9 (discard) is closed on test machines; the connect fails fast.
        let gateway = HttpSmsGateway::new(
            "http://127.0.0.1:9/send",
            vec!["+5511999990000".to_string()],
            Some("token".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(gateway.send("x"), Err(SendError::Transport(_))));
    }
}
