//! Fatal evaluator errors.
//!
//! Per-line and per-predicate problems never surface here; they are absorbed
//! into [`crate::SkippedLine`] and [`crate::DecisionBasis`].

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tidegate_config::ConfigError;

use crate::telemetry::TelemetryReadError;

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryReadError),
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to serialize proposal: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no free proposal name for {stamp} in {}", dir.display())]
    NamesExhausted { stamp: String, dir: PathBuf },
}

impl EvaluatorError {
    pub(crate) fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        tracing::warn!(path = %path.display(), "Failed to {action}: {source}");
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The resource that failed, when there is one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            EvaluatorError::Config(err) => Some(err.path()),
            EvaluatorError::Telemetry(err) => Some(err.path()),
            EvaluatorError::Io { path, .. } => Some(path),
            EvaluatorError::NamesExhausted { dir, .. } => Some(dir),
            EvaluatorError::Serialize(_) => None,
        }
    }

    /// Whether a required input file was absent.
    #[must_use]
    pub fn is_missing_input(&self) -> bool {
        match self {
            EvaluatorError::Config(err) => err.is_missing(),
            EvaluatorError::Telemetry(TelemetryReadError::Missing { .. }) => true,
            _ => false,
        }
    }
}
