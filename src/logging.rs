/// Structured logging for the flood risk monitor
///
/// Provides context-rich logging with component tags, timestamps, and
/// severity levels. Supports both console output and file-based logging
/// for unattended `watch` sessions.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::model::ReadingKind;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    River,
    Rain,
    Model,
    Alert,
    Database,
    System,
}

impl From<ReadingKind> for Component {
    fn from(kind: ReadingKind) -> Self {
        match kind {
            ReadingKind::River => Component::River,
            ReadingKind::Rain => Component::Rain,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::River => write!(f, "RIVER"),
            Component::Rain => write!(f, "RAIN"),
            Component::Model => write!(f, "MODEL"),
            Component::Alert => write!(f, "ALERT"),
            Component::Database => write!(f, "DB"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - source is known to be intermittently offline
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, component: Component, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        format!("{} {} {}: {}", timestamp, level, component, message)
    }

    fn log(&self, level: LogLevel, component: Component, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, message);

        // Console output goes to stderr so the dashboard on stdout stays clean
        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}: {}", component, message),
                LogLevel::Warning => eprintln!("   ⚠ {}: {}", component, message),
                LogLevel::Info => eprintln!("   {}", message),
                LogLevel::Debug => {}
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, message: &str) {
    emit(LogLevel::Info, component, message);
}

/// Log a warning message
pub fn warn(component: Component, message: &str) {
    emit(LogLevel::Warning, component, message);
}

/// Log an error message
pub fn error(component: Component, message: &str) {
    emit(LogLevel::Error, component, message);
}

/// Log a debug message
pub fn debug(component: Component, message: &str) {
    emit(LogLevel::Debug, component, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a reading-source failure based on the error text
pub fn classify_fetch_failure(error_message: &str) -> FailureType {
    if error_message.contains("HTTP error") || error_message.contains("Transport error") {
        FailureType::Unexpected
    } else if error_message.contains("Parse error") {
        // The source changed its payload shape
        FailureType::Unexpected
    } else if error_message.contains("No data") {
        // Gauges report empty item lists between telemetry windows
        FailureType::Expected
    } else {
        FailureType::Unknown
    }
}

/// Log a reading-source failure with automatic classification
pub fn log_fetch_failure(kind: ReadingKind, operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_fetch_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(kind.into(), &message),
        FailureType::Unexpected => error(kind.into(), &message),
        FailureType::Unknown => warn(kind.into(), &message),
    }
}
