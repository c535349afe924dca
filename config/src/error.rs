use std::path::{Path, PathBuf};

use thiserror::Error;

/// Load or persist failure for one configuration resource.
///
/// Every variant names the resource and its path so the CLI can report
/// exactly what failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} not found at {}", path.display())]
    Missing { what: &'static str, path: PathBuf },
    #[error("failed to read {what} at {}: {source}", path.display())]
    Read {
        what: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{what} at {} is malformed: {message}", path.display())]
    Malformed {
        what: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error("{what} at {} is invalid: {message}", path.display())]
    Invalid {
        what: &'static str,
        path: PathBuf,
        message: String,
    },
    #[error("failed to write {what} at {}: {source}", path.display())]
    Write {
        what: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Missing { path, .. }
            | ConfigError::Read { path, .. }
            | ConfigError::Malformed { path, .. }
            | ConfigError::Invalid { path, .. }
            | ConfigError::Write { path, .. } => path,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, ConfigError::Missing { .. })
    }
}
