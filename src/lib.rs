//! Flood risk monitor.
//!
//! Fetches the latest river level and rainfall, predicts the seasonal and
//! rain-adjusted river levels, classifies flood risk against operator
//! thresholds, and offers a deduplicated SMS alert when the risk is severe.

pub mod alert;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod predict;
pub mod render;
pub mod session;
pub mod verify;
