//! Unified error type for rendition.
//!
//! Every library crate funnels its failures into [`Error`]. The variants map
//! onto the failure classes the scheduler cares about: storage failures are
//! retried on the next tick, encode failures leave a `failed` job behind,
//! probe failures degrade to zeroed metrics, and missing sources skip work.

use std::fmt;

/// Unified error type covering all failure modes in rendition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "transcode_job", "original").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The record store is unavailable or returned an inconsistent result.
    #[error("Database error: {0}")]
    Database(String),

    /// The encoder exited non-zero or produced no output.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Metrics extraction failed on a file.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The source a job or request refers to no longer exists, either as a
    /// row or as a file in storage.
    #[error("Source missing: {0}")]
    MissingSource(String),

    /// An external tool could not be spawned or timed out.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Convenience constructor for [`Error::Encode`].
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Convenience constructor for [`Error::Probe`].
    pub fn probe<S: Into<String>>(msg: S) -> Self {
        Self::Probe(msg.into())
    }

    /// Convenience constructor for [`Error::MissingSource`].
    pub fn missing_source(what: impl fmt::Display) -> Self {
        Self::MissingSource(what.to_string())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidInput`].
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Convenience constructor for [`Error::Internal`].
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the caller should simply try again on its next tick.
    ///
    /// Only storage failures qualify: nothing was mutated, so no work is lost.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("transcode_job", 42);
        assert_eq!(err.to_string(), "transcode_job not found: 42");

        let err = Error::database("disk I/O error");
        assert_eq!(err.to_string(), "Database error: disk I/O error");

        let err = Error::encode("ffmpeg exited with status 1");
        assert_eq!(err.to_string(), "Encode error: ffmpeg exited with status 1");

        let err = Error::missing_source("/data/a.mp4");
        assert_eq!(err.to_string(), "Source missing: /data/a.mp4");

        let err = Error::tool("ffprobe", "timed out after 60s");
        assert_eq!(err.to_string(), "Tool error [ffprobe]: timed out after 60s");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_matches!(Error::from(io_err), Error::Io(_));
    }

    #[test]
    fn test_only_storage_errors_are_retryable() {
        assert!(Error::database("locked").is_retryable());
        assert!(!Error::encode("exit 1").is_retryable());
        assert!(!Error::probe("no streams").is_retryable());
        assert!(!Error::missing_source("x").is_retryable());
        assert!(!Error::not_found("original", 1).is_retryable());
    }
}
