//! Error types for tally operations.
//!
//! This module defines [`TallyError`], the error enum shared by every tally
//! crate. Per-line and per-candidate problems never become errors; they are
//! logged and skipped. Only failures that identify a whole session (or the
//! tool's own setup) surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`TallyError`].
pub type Result<T> = std::result::Result<T, TallyError>;

/// Error type for all tally operations.
#[derive(Debug, Error)]
pub enum TallyError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a file: {path}")]
    NotAFile { path: PathBuf },

    /// Permission denied
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Parsing Errors
    // =========================================================================
    /// JSON encoding/decoding error
    #[error("JSON error in {context}: {message}")]
    JsonParse {
        context: String,
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Log line could not be decoded (non-fatal; readers skip these)
    #[error("Malformed log line {line_number} in {path}: {message}")]
    LogParse {
        path: PathBuf,
        line_number: usize,
        message: String,
    },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Session identifier could not be resolved to a file
    #[error("Could not find session '{session}'")]
    SessionNotFound { session: String },

    /// Batch mode found nothing to analyze
    #[error("No sessions found in {path}")]
    NoSessionsFound { path: PathBuf },

    /// Batch mode was requested without a directory
    #[error("--all requires a directory path or --base-dir")]
    BatchDirectoryMissing,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in tally)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TallyError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source,
        }
    }

    /// Create an I/O error, mapping well-known kinds to their dedicated variants
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io {
                operation: operation.into(),
                path,
                source,
            },
        }
    }

    /// Create a JSON error
    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::JsonParse {
            context: context.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a session lookup error
    pub fn session_not_found(session: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session: session.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } | Self::ConfigValidation { .. }
        )
    }

    /// Returns true if this error means the requested session could not be analyzed at all
    pub fn is_session_error(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound { .. }
                | Self::NoSessionsFound { .. }
                | Self::FileNotFound { .. }
                | Self::NotAFile { .. }
                | Self::PermissionDenied { .. }
        )
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::SessionNotFound { .. } => Some("Try specifying --base-dir or a full path"),
            Self::NoSessionsFound { .. } => {
                Some("Session files are named <uuid>.jsonl; check the directory")
            }
            Self::ConfigInvalid { .. } => Some("Check YAML syntax in the tally config file"),
            Self::ConfigNotFound { .. } => Some("Check the path passed to --config"),
            Self::PermissionDenied { .. } => Some("Check file permissions"),
            _ => None,
        }
    }
}
