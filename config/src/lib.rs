//! Configuration loading and persistence for tidegate.
//!
//! Nothing here reads a process-wide root implicitly: callers build a
//! [`TunerPaths`] once and hand it to each component.

mod error;
mod lunar;
mod paths;
mod policy;
mod store;

pub use error::ConfigError;
pub use lunar::LunarConfig;
pub use paths::{APPLY_ENV, ApplyAuthorization, ROOT_ENV, TunerPaths};
pub use policy::{MAX_WINDOW_HOURS, TuningPolicy, Window};
pub use store::ProfileStore;

use std::path::Path;

/// Read a required file, mapping absence to [`ConfigError::Missing`].
pub(crate) fn read_required(what: &'static str, path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "{what} not found");
            Err(ConfigError::Missing {
                what,
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            tracing::warn!(path = %path.display(), "Failed to read {what}: {source}");
            Err(ConfigError::Read {
                what,
                path: path.to_path_buf(),
                source,
            })
        }
    }
}
