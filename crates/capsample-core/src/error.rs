//! Error types for sampling and report generation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the report engine when a precondition does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// No samples were taken, so no proportion can be estimated.
    #[error("Total sample count is zero")]
    NoSamples,

    /// A sample count is larger than the budget it was drawn from.
    #[error("Sample count {count} exceeds total sample count {total}")]
    CountExceedsTotal { count: u64, total: u64 },

    /// Adding a weight would overflow a tree's total.
    #[error("Adding weight {weight} to total {total} overflows")]
    WeightOverflow { total: u64, weight: u64 },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Errors that can occur while collecting samples from a backend.
#[derive(Debug, Error)]
pub enum SampleError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A request targeted a root the backend was not opened on.
    #[error("Backend rooted at {expected} cannot sample {requested}")]
    RootMismatch { expected: PathBuf, requested: PathBuf },

    /// The worker pool could not be created.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// An identity or attribute lookup failed.
    #[error("Lookup failed for {key}: {message}")]
    Lookup { key: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl SampleError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a lookup failure for the given key.
    pub fn lookup(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Kind of sampling warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Error reading a directory entry.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal warning encountered while indexing a sample backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl SampleWarning {
    /// Create a new sampling warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_error_io() {
        let err = SampleError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, SampleError::PermissionDenied { .. }));

        let err = SampleError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::Other, "boom"),
        );
        assert!(matches!(err, SampleError::Io { .. }));
    }

    #[test]
    fn test_report_error_messages() {
        assert_eq!(ReportError::NoSamples.to_string(), "Total sample count is zero");
        let err = ReportError::CountExceedsTotal { count: 3, total: 2 };
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_sample_warning_creation() {
        let warning = SampleWarning::new("/test/path", "Read error: boom", WarningKind::ReadError);
        assert_eq!(warning.kind, WarningKind::ReadError);
        assert!(warning.message.contains("boom"));
    }
}
