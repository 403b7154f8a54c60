//! Monitor configuration.
//!
//! Loaded from a TOML file (default `./flood_monitor.toml`). Every section
//! is optional; missing keys fall back to the values in `Default`. Secrets
//! (database URL, SMS token) are read from the environment after `.env`
//! has been loaded, never from the TOML file.

use serde::Deserialize;
use std::fmt;
use std::path::Path;

use crate::logging::LogLevel;
use crate::model::Thresholds;

pub const DEFAULT_CONFIG_PATH: &str = "./flood_monitor.toml";

/// Environment variable holding the Postgres connection string.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Environment variable holding the SMS gateway bearer token.
pub const SMS_TOKEN_VAR: &str = "SMS_API_TOKEN";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SiteConfig {
    /// City named in the dashboard title and alert messages.
    pub city: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            city: "São Paulo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    pub moderate_m: f64,
    pub severe_m: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let t = Thresholds::default();
        ThresholdConfig {
            moderate_m: t.moderate_m,
            severe_m: t.severe_m,
        }
    }
}

impl From<&ThresholdConfig> for Thresholds {
    fn from(c: &ThresholdConfig) -> Self {
        Thresholds {
            moderate_m: c.moderate_m,
            severe_m: c.severe_m,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub river_level_url: String,
    pub rain_volume_url: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            river_level_url: "http://localhost:8000/api/readings/river/latest".to_string(),
            rain_volume_url: "http://localhost:8000/api/readings/rain/latest".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub expected_level_path: String,
    pub rain_adjusted_path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            expected_level_path: "models/expected_level.json".to_string(),
            rain_adjusted_path: "models/rain_adjusted.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SmsConfig {
    /// Gateway endpoint; `None` disables sending.
    pub endpoint: Option<String>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig { interval_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub site: SiteConfig,
    pub thresholds: ThresholdConfig,
    pub sources: SourceConfig,
    pub models: ModelConfig,
    pub sms: SmsConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl MonitorConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds::from(&self.thresholds)
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        self.logging.level.parse().map_err(ConfigError::Invalid)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.timeout_secs == 0 {
            return Err(ConfigError::Invalid("sources.timeout_secs must be > 0".into()));
        }
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh.interval_secs must be > 0".into()));
        }
        for (name, value) in [
            ("thresholds.moderate_m", self.thresholds.moderate_m),
            ("thresholds.severe_m", self.thresholds.severe_m),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite value >= 0, got {}",
                    name, value
                )));
            }
        }
        self.log_level()?;
        Ok(())
    }
}

/// Load the monitor configuration from `path`.
///
/// A missing file is not an error: the built-in defaults are returned so the
/// dashboard can start on a fresh checkout.
pub fn load_config(path: impl AsRef<Path>) -> Result<MonitorConfig, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(MonitorConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    MonitorConfig::from_toml_str(&contents)
}

/// Secrets pulled from the process environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub database_url: Option<String>,
    pub sms_token: Option<String>,
}

impl Secrets {
    /// Load `.env` (if present) and read secrets from the environment.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Secrets {
            database_url: std::env::var(DATABASE_URL_VAR).ok().filter(|s| !s.is_empty()),
            sms_token: std::env::var(SMS_TOKEN_VAR).ok().filter(|s| !s.is_empty()),
        }
    }
}
