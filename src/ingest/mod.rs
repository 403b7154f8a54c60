/// Reading acquisition.
///
/// Submodules:
/// - `readings` — HTTP client for the latest river/rain values and the
///   clamped-fallback acquisition used by every evaluation.

pub mod readings;

pub use readings::{acquire_reading, Acquisition, HttpReadingSource, ReadingSource};
