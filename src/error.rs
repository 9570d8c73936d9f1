//! Fatal error types for the archive pipeline
//!
//! Anything represented here aborts the whole run before a manifest is written.
//! Recoverable conditions are reported as [`crate::warning::Warning`] instead.

use std::path::PathBuf;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Error types for archive operations
#[derive(thiserror::Error, Debug)]
pub enum ArchiveError {
    #[error("Got HTTP {status} when retrieving {url}")]
    Fetch { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Multiple master files for stem \"{stem}\": {first} and {second}")]
    AmbiguousAsset {
        stem: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No master files available to resolve \"{stem}\"")]
    NoAsset { stem: String },

    #[error("Transcoding \"{stem}\" failed ({status}): {command}")]
    Transcode {
        stem: String,
        command: String,
        status: String,
    },

    #[error("Probing {path} failed: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
