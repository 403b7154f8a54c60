//! Configuration Verification Module
//!
//! Checks a monitor configuration against the live environment: are both
//! reading endpoints answering with usable data, do both model files load,
//! is the SMS gateway configured, and (when `DATABASE_URL` is set) does the
//! reading store answer. Nothing is sent over SMS.
//!
//! Run this after editing `flood_monitor.toml` and before leaving a
//! `watch` session unattended.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

use crate::config::{MonitorConfig, Secrets};
use crate::db::PostgresStore;
use crate::ingest::{HttpReadingSource, ReadingSource};
use crate::model::ReadingKind;
use crate::predict::features::{RAIN_ADJUSTED_FEATURES, SEASONAL_FEATURES};
use crate::predict::LinearRegressor;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub source_results: Vec<SourceVerification>,
    pub model_results: Vec<ModelVerification>,
    pub sms_result: SmsVerification,
    /// Absent when no database is configured.
    pub store_result: Option<StoreVerification>,
    pub summary: VerificationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSummary {
    pub checks_total: usize,
    pub checks_working: usize,
    pub checks_failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceVerification {
    pub kind: String,
    pub url: String,
    pub status: VerificationStatus,
    pub value: Option<f64>,
    pub below_floor: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVerification {
    pub name: String,
    pub path: String,
    pub status: VerificationStatus,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsVerification {
    pub status: VerificationStatus,
    pub endpoint: Option<String>,
    pub recipients: usize,
    pub token_present: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreVerification {
    pub status: VerificationStatus,
    pub last_river_level: Option<f64>,
    pub last_recorded_at: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

// ============================================================================
// Reading Sources
// ============================================================================

/// A source that answers with a value below the floor still works, but the
/// dashboard will show the floor instead; that is reported as partial.
pub fn verify_source(source: &dyn ReadingSource, kind: ReadingKind, url: &str) -> SourceVerification {
    let mut result = SourceVerification {
        kind: kind.as_str().to_string(),
        url: url.to_string(),
        status: VerificationStatus::Failed,
        value: None,
        below_floor: false,
        error_message: None,
    };

    match source.fetch(kind) {
        Ok(value) => {
            result.value = Some(value);
            result.below_floor = value < kind.floor();
            result.status = if result.below_floor {
                VerificationStatus::PartialSuccess
            } else {
                VerificationStatus::Success
            };
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    result
}

// ============================================================================
// Models
// ============================================================================

pub fn verify_model(name: &str, path: &str, layout: &[&str]) -> ModelVerification {
    match LinearRegressor::load(path, layout) {
        Ok(_) => ModelVerification {
            name: name.to_string(),
            path: path.to_string(),
            status: VerificationStatus::Success,
            error_message: None,
        },
        Err(e) => ModelVerification {
            name: name.to_string(),
            path: path.to_string(),
            status: VerificationStatus::Failed,
            error_message: Some(e.to_string()),
        },
    }
}

// ============================================================================
// SMS
// ============================================================================

pub fn verify_sms(config: &MonitorConfig, secrets: &Secrets) -> SmsVerification {
    let mut result = SmsVerification {
        status: VerificationStatus::Failed,
        endpoint: config.sms.endpoint.clone(),
        recipients: config.sms.recipients.len(),
        token_present: secrets.sms_token.is_some(),
        error_message: None,
    };

    if result.endpoint.is_none() {
        result.error_message = Some("sms.endpoint is not set".to_string());
    } else if result.recipients == 0 {
        result.error_message = Some("sms.recipients is empty".to_string());
    } else if !result.token_present {
        result.status = VerificationStatus::PartialSuccess;
        result.error_message = Some("SMS_API_TOKEN is not set; requests will be unauthenticated".to_string());
    } else {
        result.status = VerificationStatus::Success;
    }

    result
}

// ============================================================================
// Reading Store
// ============================================================================

/// Connects to the store and reads back the newest river reading. An empty
/// table still counts as working.
pub fn verify_store(database_url: Option<&str>) -> Option<StoreVerification> {
    let url = database_url?;
    let mut result = StoreVerification {
        status: VerificationStatus::Failed,
        last_river_level: None,
        last_recorded_at: None,
        error_message: None,
    };

    match PostgresStore::connect(url).and_then(|mut store| store.recent(ReadingKind::River, 1)) {
        Ok(rows) => {
            if let Some((value, at)) = rows.first() {
                result.last_river_level = Some(*value);
                result.last_recorded_at = Some(at.to_rfc3339());
            }
            result.status = VerificationStatus::Success;
        }
        Err(e) => {
            result.error_message = Some(e.to_string());
        }
    }

    Some(result)
}

// ============================================================================
// Full Verification Runner
// ============================================================================

pub fn run_full_verification(
    config: &MonitorConfig,
    secrets: &Secrets,
) -> Result<VerificationReport, Box<dyn Error>> {
    let source = HttpReadingSource::new(
        &config.sources.river_level_url,
        &config.sources.rain_volume_url,
        Duration::from_secs(config.sources.timeout_secs),
    )?;

    let source_results: Vec<SourceVerification> = [ReadingKind::River, ReadingKind::Rain]
        .into_iter()
        .map(|kind| verify_source(&source, kind, source.url_for(kind)))
        .collect();

    let model_results = vec![
        verify_model("expected level", &config.models.expected_level_path, SEASONAL_FEATURES),
        verify_model("rain adjusted", &config.models.rain_adjusted_path, RAIN_ADJUSTED_FEATURES),
    ];

    let sms_result = verify_sms(config, secrets);
    let store_result = verify_store(secrets.database_url.as_deref());

    let statuses: Vec<&VerificationStatus> = source_results
        .iter()
        .map(|r| &r.status)
        .chain(model_results.iter().map(|r| &r.status))
        .chain(std::iter::once(&sms_result.status))
        .chain(store_result.iter().map(|r| &r.status))
        .collect();
    let checks_failed = statuses.iter().filter(|s| ***s == VerificationStatus::Failed).count();

    let summary = VerificationSummary {
        checks_total: statuses.len(),
        checks_working: statuses.len() - checks_failed,
        checks_failed,
    };

    Ok(VerificationReport {
        timestamp: Utc::now().to_rfc3339(),
        source_results,
        model_results,
        sms_result,
        store_result,
        summary,
    })
}

fn status_mark(status: &VerificationStatus) -> &'static str {
    match status {
        VerificationStatus::Success => "✓ OK",
        VerificationStatus::PartialSuccess => "⚠ Partial",
        VerificationStatus::Failed => "✗ FAILED",
    }
}

pub fn print_summary(report: &VerificationReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 VERIFICATION SUMMARY");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    for r in &report.source_results {
        match (&r.value, &r.error_message) {
            (Some(v), _) => println!("  {:<6} {:<10} {} ({})", r.kind, status_mark(&r.status), v, r.url),
            (None, Some(e)) => println!("  {:<6} {:<10} {} ({})", r.kind, status_mark(&r.status), e, r.url),
            (None, None) => println!("  {:<6} {:<10} ({})", r.kind, status_mark(&r.status), r.url),
        }
    }
    for r in &report.model_results {
        println!(
            "  MODEL  {:<10} {} {}",
            status_mark(&r.status),
            r.name,
            r.error_message.as_deref().unwrap_or("")
        );
    }
    println!(
        "  SMS    {:<10} {} recipient(s) {}",
        status_mark(&report.sms_result.status),
        report.sms_result.recipients,
        report.sms_result.error_message.as_deref().unwrap_or("")
    );
    match &report.store_result {
        Some(r) => match (r.last_river_level, &r.last_recorded_at, &r.error_message) {
            (Some(v), Some(at), _) => println!("  STORE  {:<10} last river {} m at {}", status_mark(&r.status), v, at),
            (_, _, Some(e)) => println!("  STORE  {:<10} {}", status_mark(&r.status), e),
            _ => println!("  STORE  {:<10} no readings yet", status_mark(&r.status)),
        },
        None => println!("  STORE  not configured (DATABASE_URL unset)"),
    }
    println!();

    let success_rate = if report.summary.checks_total > 0 {
        (report.summary.checks_working as f64 / report.summary.checks_total as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Overall: {:.1}% ({}/{} checks working, {} failed)",
        success_rate, report.summary.checks_working, report.summary.checks_total, report.summary.checks_failed
    );
    println!("═══════════════════════════════════════════════════════════");
}
