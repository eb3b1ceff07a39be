//! Error types for the Scorecast core
//!
//! The frame codec and the report scanner are total: malformed input is
//! tolerated rather than rejected, so the only failures surfaced here come
//! from reading event files and from asking for a summary that does not exist.

use std::path::PathBuf;

// ----------------------------------------------------------------------------
// Event File Errors
// ----------------------------------------------------------------------------

/// Failures while loading a locally authored event file
#[derive(Debug, thiserror::Error)]
pub enum EventFileError {
    #[error("Could not read event file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse event file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ----------------------------------------------------------------------------
// Summary Errors
// ----------------------------------------------------------------------------

/// Failures while rendering a game summary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryError {
    #[error("No data for requested game/user")]
    NotFound { topic: String, reporter: String },
}
