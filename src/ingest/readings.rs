/// Latest-reading API client
///
/// Retrieves the most recent river level and rainfall volume from the
/// monitoring station's HTTP API. Both endpoints answer with the same
/// envelope, newest item first:
///
/// ```json
/// { "items": [ { "valor": "716.42", "data": "2024-05-01T12:45:00" }, ... ] }
/// ```
///
/// `valor` is sometimes a JSON number and sometimes a numeric string,
/// depending on the station firmware.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::logging;
use crate::model::{FetchError, Reading, ReadingKind, ReadingOrigin};

// ============================================================================
// Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    #[serde(default)]
    pub items: Vec<LatestItem>,
}

#[derive(Debug, Deserialize)]
pub struct LatestItem {
    pub valor: RawValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    fn as_f64(&self) -> Result<f64, FetchError> {
        let value = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| FetchError::ParseError(format!("valor '{}': {}", s, e)))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(FetchError::ParseError(format!("valor is not finite: {}", value)))
        }
    }
}

/// Extract the first item's value from a latest-reading response body.
pub fn parse_latest_response(body: &str, kind: ReadingKind) -> Result<f64, FetchError> {
    let response: LatestResponse =
        serde_json::from_str(body).map_err(|e| FetchError::ParseError(e.to_string()))?;

    response
        .items
        .first()
        .ok_or(FetchError::NoDataAvailable(kind))?
        .valor
        .as_f64()
}

// ============================================================================
// Reading Source
// ============================================================================

/// Anything that can produce the latest raw value for a reading kind.
pub trait ReadingSource {
    fn fetch(&self, kind: ReadingKind) -> Result<f64, FetchError>;
}

/// Reading source backed by the station's HTTP API.
pub struct HttpReadingSource {
    client: reqwest::blocking::Client,
    river_level_url: String,
    rain_volume_url: String,
}

impl HttpReadingSource {
    pub fn new(
        river_level_url: &str,
        rain_volume_url: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpReadingSource {
            client,
            river_level_url: river_level_url.to_string(),
            rain_volume_url: rain_volume_url.to_string(),
        })
    }

    pub fn url_for(&self, kind: ReadingKind) -> &str {
        match kind {
            ReadingKind::River => &self.river_level_url,
            ReadingKind::Rain => &self.rain_volume_url,
        }
    }
}

impl ReadingSource for HttpReadingSource {
    fn fetch(&self, kind: ReadingKind) -> Result<f64, FetchError> {
        let url = self.url_for(kind);
        logging::debug(kind.into(), &format!("GET {}", url));

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::HttpError(response.status().as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_latest_response(&body, kind)
    }
}

// ============================================================================
// Acquisition with fallback
// ============================================================================

/// A reading together with the failure that forced a fallback, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Acquisition {
    pub reading: Reading,
    pub failure: Option<FetchError>,
}

impl Acquisition {
    /// Operator-facing notice when the floor value was substituted.
    pub fn notice(&self) -> Option<String> {
        self.failure.as_ref().map(|e| {
            format!(
                "Could not fetch {} reading: {}. Using {:.1} {} as default.",
                self.reading.kind.as_str().to_lowercase(),
                e,
                self.reading.value,
                self.reading.kind.unit()
            )
        })
    }
}

/// Fetch one reading, clamping it to its floor, or substitute the floor when
/// the source fails. Never returns an error.
pub fn acquire_reading(
    source: &dyn ReadingSource,
    kind: ReadingKind,
    now: DateTime<Utc>,
) -> Acquisition {
    match source.fetch(kind) {
        Ok(raw) => {
            let reading = Reading::clamped(kind, raw, ReadingOrigin::Fetched, now);
            if reading.value != raw {
                logging::debug(
                    kind.into(),
                    &format!("raw value {} clamped to floor {}", raw, reading.value),
                );
            }
            Acquisition { reading, failure: None }
        }
        Err(e) => {
            logging::log_fetch_failure(kind, "fetch latest", &e);
            Acquisition {
                reading: Reading::fallback(kind, now),
                failure: Some(e),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedSource(Result<f64, FetchError>);

    impl ReadingSource for FixedSource {
        fn fetch(&self, _kind: ReadingKind) -> Result<f64, FetchError> {
            self.0.clone()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_numeric_valor() {
        let body = r#"{"items":[{"valor": 716.42},{"valor": 716.1}]}"#;
        assert_eq!(parse_latest_response(body, ReadingKind::River), Ok(716.42));
    }

    #[test]
    fn test_parse_string_valor() {
        let body = r#"{"items":[{"valor": " 12.5 ", "data": "2024-05-01T12:45:00"}]}"#;
        assert_eq!(parse_latest_response(body, ReadingKind::Rain), Ok(12.5));
    }

    #[test]
    fn test_parse_empty_items_is_no_data() {
        let body = r#"{"items":[]}"#;
        assert_eq!(
            parse_latest_response(body, ReadingKind::Rain),
            Err(FetchError::NoDataAvailable(ReadingKind::Rain))
        );
    }

    #[test]
    fn test_parse_missing_items_is_no_data() {
        assert_eq!(
            parse_latest_response("{}", ReadingKind::River),
            Err(FetchError::NoDataAvailable(ReadingKind::River))
        );
    }

    #[test]
    fn test_parse_non_numeric_string_is_parse_error() {
        let body = r#"{"items":[{"valor": "n/a"}]}"#;
        assert!(matches!(
            parse_latest_response(body, ReadingKind::River),
            Err(FetchError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_nan_string_is_parse_error() {
        let body = r#"{"items":[{"valor": "NaN"}]}"#;
        assert!(matches!(
            parse_latest_response(body, ReadingKind::River),
            Err(FetchError::ParseError(_))
        ));
    }

    #[test]
    fn test_parse_garbage_body_is_parse_error() {
        assert!(matches!(
            parse_latest_response("<html>502</html>", ReadingKind::River),
            Err(FetchError::ParseError(_))
        ));
    }

    #[test]
    fn test_acquire_clamps_low_river_value() {
        let acq = acquire_reading(&FixedSource(Ok(3.2)), ReadingKind::River, now());
        assert_eq!(acq.reading.value, 715.0);
        assert_eq!(acq.reading.origin, ReadingOrigin::Fetched);
        assert!(acq.failure.is_none());
        assert!(acq.notice().is_none());
    }

    #[test]
    fn test_acquire_failure_substitutes_floor_with_notice() {
        let source = FixedSource(Err(FetchError::HttpError(503)));
        let acq = acquire_reading(&source, ReadingKind::River, now());
        assert_eq!(acq.reading.value, 715.0);
        assert_eq!(acq.reading.origin, ReadingOrigin::Fallback);
        assert_eq!(acq.failure, Some(FetchError::HttpError(503)));
        let notice = acq.notice().unwrap();
        assert!(notice.contains("river"), "{}", notice);
        assert!(notice.contains("715.0"), "{}", notice);
    }

    #[test]
    fn test_acquire_rain_failure_defaults_to_zero() {
        let source = FixedSource(Err(FetchError::Transport("timed out".into())));
        let acq = acquire_reading(&source, ReadingKind::Rain, now());
        assert_eq!(acq.reading.value, 0.0);
        assert_eq!(acq.reading.taken_at, now());
    }
}
