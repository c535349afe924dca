//! Optional lunar nudge settings.
//!
//! ```toml
//! enabled = true
//! log = false
//!
//! [caps]
//! min = 0.85
//! max = 1.15
//! ```

use std::path::Path;

use serde::Deserialize;
use tidegate_types::NudgeCaps;

use crate::{ConfigError, read_required};

const WHAT: &str = "lunar nudge config";

#[derive(Debug, Default, Deserialize)]
struct RawLunar {
    enabled: Option<bool>,
    log: Option<bool>,
    caps: Option<RawCaps>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCaps {
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LunarConfig {
    enabled: bool,
    log: bool,
    caps: NudgeCaps,
}

impl Default for LunarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log: false,
            caps: NudgeCaps::default(),
        }
    }
}

impl LunarConfig {
    /// Load settings; an absent file means defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match read_required(WHAT, path) {
            Ok(content) => Self::parse(&content, path),
            Err(err) if err.is_missing() => {
                tracing::debug!(path = %path.display(), "No lunar config; using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err),
        }
    }

    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawLunar = toml::from_str(content).map_err(|err| ConfigError::Malformed {
            what: WHAT,
            path: origin.to_path_buf(),
            message: err.to_string(),
        })?;
        let caps = raw.caps.unwrap_or_default();
        let caps = NudgeCaps::new(
            caps.min.unwrap_or(NudgeCaps::DEFAULT_LO),
            caps.max.unwrap_or(NudgeCaps::DEFAULT_HI),
        )
        .map_err(|err| ConfigError::Invalid {
            what: WHAT,
            path: origin.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(Self {
            enabled: raw.enabled.unwrap_or(true),
            log: raw.log.unwrap_or(false),
            caps,
        })
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether computed nudges are echoed into the telemetry log.
    #[must_use]
    pub fn log(&self) -> bool {
        self.log
    }

    #[must_use]
    pub fn caps(&self) -> NudgeCaps {
        self.caps
    }
}
