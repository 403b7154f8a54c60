/// Reading persistence.
///
/// Manual overrides entered on the dashboard are recorded so the models can
/// be retrained on operator-observed levels. Persistence is fire-and-forget:
/// a failed insert is logged and the evaluation carries on.

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls};
use std::fmt;

use crate::logging::{self, Component};
use crate::model::{Reading, ReadingKind};

const SCHEMA_SQL: &str = "
    CREATE SCHEMA IF NOT EXISTS flood_monitor;
    CREATE TABLE IF NOT EXISTS flood_monitor.readings (
        id          BIGSERIAL PRIMARY KEY,
        kind        TEXT             NOT NULL CHECK (kind IN ('RIVER', 'RAIN')),
        value       DOUBLE PRECISION NOT NULL,
        recorded_at TIMESTAMPTZ      NOT NULL
    );
";

#[derive(Debug)]
pub enum StoreError {
    Connect(String),
    Query(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connect(msg) => write!(f, "Database connection failed: {}", msg),
            StoreError::Query(msg) => write!(f, "Database query failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Sink for readings.
pub trait ReadingStore {
    fn persist(&mut self, kind: ReadingKind, value: f64, at: DateTime<Utc>) -> Result<(), StoreError>;
}

/// Store used when no database is configured.
pub struct NullStore;

impl ReadingStore for NullStore {
    fn persist(&mut self, kind: ReadingKind, value: f64, _at: DateTime<Utc>) -> Result<(), StoreError> {
        logging::debug(Component::Database, &format!("no store configured; dropped {} {}", kind, value));
        Ok(())
    }
}

pub struct PostgresStore {
    client: Client,
}

impl PostgresStore {
    /// Connect and create the readings table if it does not exist.
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let mut client =
            Client::connect(database_url, NoTls).map_err(|e| StoreError::Connect(e.to_string()))?;
        client
            .batch_execute(SCHEMA_SQL)
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(PostgresStore { client })
    }

    /// Most recent readings of `kind`, newest first.
    pub fn recent(&mut self, kind: ReadingKind, limit: i64) -> Result<Vec<(f64, DateTime<Utc>)>, StoreError> {
        let rows = self
            .client
            .query(
                "SELECT value, recorded_at FROM flood_monitor.readings
                 WHERE kind = $1 ORDER BY recorded_at DESC LIMIT $2",
                &[&kind.as_str(), &limit],
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(rows.iter().map(|row| (row.get(0), row.get(1))).collect())
    }
}

impl ReadingStore for PostgresStore {
    fn persist(&mut self, kind: ReadingKind, value: f64, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.client
            .execute(
                "INSERT INTO flood_monitor.readings (kind, value, recorded_at) VALUES ($1, $2, $3)",
                &[&kind.as_str(), &value, &at],
            )
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }
}

/// Open the Postgres store when a URL is given, otherwise `NullStore`.
/// A connection failure is logged and also yields `NullStore`.
pub fn open_store(database_url: Option<&str>) -> Box<dyn ReadingStore> {
    let Some(url) = database_url else {
        logging::info(Component::Database, "DATABASE_URL not set; readings will not be persisted");
        return Box::new(NullStore);
    };
    match PostgresStore::connect(url) {
        Ok(store) => Box::new(store),
        Err(e) => {
            logging::error(Component::Database, &e.to_string());
            Box::new(NullStore)
        }
    }
}

/// Persist a reading, logging and swallowing any failure.
pub fn persist_reading(store: &mut dyn ReadingStore, reading: &Reading) {
    if let Err(e) = store.persist(reading.kind, reading.value, reading.taken_at) {
        logging::warn(
            Component::Database,
            &format!("Could not save {} reading {}: {}", reading.kind, reading.value, e),
        );
    }
}
