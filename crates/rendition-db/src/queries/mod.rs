//! Database query modules.

pub mod media;
pub mod originals;
pub mod transcode_jobs;

/// Current time in the fixed-width form used for every timestamp column.
///
/// Fixed width keeps lexical `ORDER BY` consistent with chronological order.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
