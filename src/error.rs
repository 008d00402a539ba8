//! Unified error types for space-archive.
//!
//! This module provides a single [`ArchiveError`] enum that covers every
//! failure the archiver can surface to a caller.
//!
//! # Severity
//!
//! Errors fall into two groups:
//! - **Fatal** errors ([`ArchiveError::is_fatal`]) end the whole run. Only an
//!   invalid or expired credential is fatal: every later call would fail the
//!   same way.
//! - Everything else is local to one resource or one conversation. The
//!   archive run records it as an anomaly and moves on.
//!
//! Per-message and per-attachment problems never become an `ArchiveError`;
//! they go straight to the [`AnomalyLog`](crate::anomaly::AnomalyLog).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// A specialized [`Result`] type for space-archive operations.
///
/// # Example
///
/// ```rust
/// use space_archive::error::Result;
/// use space_archive::Message;
///
/// fn my_function() -> Result<Vec<Message>> {
///     Ok(vec![])
/// }
/// ```
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// The error type for all space-archive operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArchiveError {
    /// An I/O error occurred while writing archive output.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The HTTP transport failed (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body or export could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The access token was rejected.
    ///
    /// Tokens expire after 12 hours; a new one is needed to continue.
    #[error(
        "access token rejected (401). Tokens are only valid for 12 hours; get a new one at https://developer.webex.com/docs/getting-started"
    )]
    Unauthorized,

    /// The requested resource does not exist (wrong identifier, or deleted).
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource kind, e.g. "room" or "messages"
        resource: &'static str,
        /// Identifier or URL that was looked up
        id: String,
    },

    /// The API answered with an unexpected status code.
    #[error("{resource} request failed with status {status}: {message}")]
    Api {
        /// Resource kind, e.g. "room" or "people"
        resource: &'static str,
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The access token is malformed.
    #[error("access token looks invalid: {reason}")]
    InvalidToken {
        /// What is wrong with it
        reason: &'static str,
    },

    /// The message cap could not be parsed.
    #[error("Invalid message cap '{input}'. Expected a count (5000) or an age in days (60d)")]
    InvalidMessageCap {
        /// The rejected input
        input: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration for {key}: {message}")]
    InvalidConfig {
        /// Setting name
        key: &'static str,
        /// Description of what's wrong
        message: String,
    },

    /// An output folder could not be prepared.
    #[error("Could not create output folder {}: {source}", path.display())]
    OutputFolder {
        /// Folder that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl ArchiveError {
    /// Creates a not-found error.
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        ArchiveError::NotFound {
            resource,
            id: id.into(),
        }
    }

    /// Creates an API status error.
    pub fn api(resource: &'static str, status: u16, message: impl Into<String>) -> Self {
        ArchiveError::Api {
            resource,
            status,
            message: message.into(),
        }
    }

    /// Creates an invalid message cap error.
    pub fn invalid_message_cap(input: impl Into<String>) -> Self {
        ArchiveError::InvalidMessageCap {
            input: input.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(key: &'static str, message: impl Into<String>) -> Self {
        ArchiveError::InvalidConfig {
            key,
            message: message.into(),
        }
    }

    /// Creates an output folder error.
    pub fn output_folder(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArchiveError::OutputFolder {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this error must terminate the whole archive run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ArchiveError::Unauthorized)
    }

    /// Returns `true` if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }

    /// Returns `true` if this is an IO error.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            ArchiveError::Io(_) | ArchiveError::OutputFolder { .. }
        )
    }

    /// Returns the HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ArchiveError::Unauthorized => Some(401),
            ArchiveError::NotFound { .. } => Some(404),
            ArchiveError::Api { status, .. } => Some(*status),
            ArchiveError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = ArchiveError::from(io_err);
        let display = err.to_string();
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_unauthorized_is_only_fatal_error() {
        assert!(ArchiveError::Unauthorized.is_fatal());
        assert!(!ArchiveError::not_found("room", "abc").is_fatal());
        assert!(!ArchiveError::api("people", 500, "boom").is_fatal());
        assert!(!ArchiveError::invalid_message_cap("x").is_fatal());
    }

    #[test]
    fn test_not_found_display() {
        let err = ArchiveError::not_found("room", "Y2lzY29zcGFyazovL3Vz");
        assert!(err.is_not_found());
        assert!(err.to_string().contains("room not found"));
        assert!(err.to_string().contains("Y2lzY29zcGFyazovL3Vz"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ArchiveError::Unauthorized.status(), Some(401));
        assert_eq!(ArchiveError::not_found("room", "x").status(), Some(404));
        assert_eq!(ArchiveError::api("people", 502, "").status(), Some(502));
        assert_eq!(ArchiveError::invalid_message_cap("x").status(), None);
    }

    #[test]
    fn test_invalid_message_cap_display() {
        let err = ArchiveError::invalid_message_cap("sixty");
        let display = err.to_string();
        assert!(display.contains("sixty"));
        assert!(display.contains("60d"));
    }

    #[test]
    fn test_output_folder_source_chain() {
        use std::error::Error;
        let err = ArchiveError::output_folder(
            "/archive/Team",
            io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        );
        assert!(err.is_io());
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/archive/Team"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: ArchiveError = json_err.into();
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn test_error_debug() {
        let err = ArchiveError::invalid_config("message_page_size", "must be positive");
        let debug = format!("{:?}", err);
        assert!(debug.contains("InvalidConfig"));
    }
}
