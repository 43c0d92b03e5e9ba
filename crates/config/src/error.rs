use std::path::PathBuf;

use thiserror::Error;

/// Failures on the write paths of the settings store.
///
/// Reads never surface these: a missing or broken document degrades to
/// defaults and is only logged.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File read/write failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Settings document could not be (de)serialized.
    #[error("invalid settings document {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// File watcher could not be started.
    #[error("watcher error: {0}")]
    Watch(String),
}

/// Why a theme document was rejected.
#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid color '{value}' for '{field}'")]
    InvalidColor { field: String, value: String },
}

impl SettingsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
