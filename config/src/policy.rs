//! Self-learning tuning policy.
//!
//! ```toml
//! [schedule]
//! window = "24h"
//!
//! [metrics]
//! min_samples = 20
//!
//! [signals]
//! reward = "coh >= 0.88 and mir <= 0.35"
//! penalty = "coh < 0.55 or mir > 0.50"
//!
//! [safety.max_delta_per_day]
//! "gates.triggers.call_harmonizers_below" = 0.04
//! "gates.triggers.early_severance_below" = 0.02
//! ```
//!
//! Raw TOML structs (all `Option`) stay private; [`TuningPolicy`] is the
//! resolved, validated form.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tidegate_types::ThresholdKey;

use crate::{ConfigError, read_required};

const WHAT: &str = "tuning policy";

pub const DEFAULT_REWARD: &str = "coh >= 0.88 and mir <= 0.35";
pub const DEFAULT_PENALTY: &str = "coh < 0.55 or mir > 0.50";
const DEFAULT_WINDOW_HOURS: u32 = 24;
/// Longest accepted window: one leap-padded year.
pub const MAX_WINDOW_HOURS: u32 = 366 * 24;
const DEFAULT_MIN_SAMPLES: u64 = 20;

#[derive(Debug, Default, Deserialize)]
struct RawPolicy {
    schedule: Option<RawSchedule>,
    metrics: Option<RawMetrics>,
    signals: Option<RawSignals>,
    safety: Option<RawSafety>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSchedule {
    window: Option<RawWindow>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWindow {
    Hours(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawMetrics {
    min_samples: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSignals {
    reward: Option<String>,
    penalty: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSafety {
    #[serde(default)]
    max_delta_per_day: BTreeMap<String, f64>,
}

/// Telemetry look-back window, whole hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window(u32);

impl Window {
    /// Parse `"<n>h"` or `"<n>d"`; the result must lie in `1..=MAX_WINDOW_HOURS`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (digits, per_unit) = if let Some(d) = raw.strip_suffix('h') {
            (d, 1)
        } else if let Some(d) = raw.strip_suffix('d') {
            (d, 24)
        } else {
            return None;
        };
        let n: u32 = digits.trim().parse().ok()?;
        Self::from_hours(n.checked_mul(per_unit)?)
    }

    #[must_use]
    pub fn from_hours(hours: u32) -> Option<Self> {
        let in_range = (1..=MAX_WINDOW_HOURS).contains(&hours);
        in_range.then_some(Self(hours))
    }

    #[must_use]
    pub const fn hours(self) -> u32 {
        self.0
    }
}

impl Default for Window {
    fn default() -> Self {
        Self(DEFAULT_WINDOW_HOURS)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.0)
    }
}

/// Resolved tuning policy.
///
/// Predicate sources are kept as text; they are compiled at decision time so
/// a bad expression degrades that run to a neutral verdict instead of
/// failing the load.
#[derive(Debug, Clone, PartialEq)]
pub struct TuningPolicy {
    window: Window,
    min_samples: u64,
    reward: String,
    penalty: String,
    max_delta_per_day: BTreeMap<String, f64>,
}

impl Default for TuningPolicy {
    fn default() -> Self {
        Self {
            window: Window::default(),
            min_samples: DEFAULT_MIN_SAMPLES,
            reward: DEFAULT_REWARD.to_string(),
            penalty: DEFAULT_PENALTY.to_string(),
            max_delta_per_day: BTreeMap::new(),
        }
    }
}

impl TuningPolicy {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = read_required(WHAT, path)?;
        Self::parse(&content, path)
    }

    /// Parse policy text; `origin` is only used for error reporting.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawPolicy = toml::from_str(content).map_err(|err| {
            tracing::warn!(path = %origin.display(), "Failed to parse {WHAT}: {err}");
            ConfigError::Malformed {
                what: WHAT,
                path: origin.to_path_buf(),
                message: err.to_string(),
            }
        })?;
        let invalid = |message: String| ConfigError::Invalid {
            what: WHAT,
            path: origin.to_path_buf(),
            message,
        };

        let window = match raw.schedule.and_then(|s| s.window) {
            None => Window::default(),
            Some(RawWindow::Hours(hours)) => u32::try_from(hours)
                .ok()
                .and_then(Window::from_hours)
                .ok_or_else(|| {
                    invalid(format!(
                        "schedule.window must be 1..={MAX_WINDOW_HOURS} hours, got {hours}"
                    ))
                })?,
            Some(RawWindow::Text(text)) => Window::parse(&text).ok_or_else(|| {
                invalid(format!(
                    "schedule.window must look like \"24h\" or \"2d\" and span at most \
                     {MAX_WINDOW_HOURS} hours, got {text:?}"
                ))
            })?,
        };

        let min_samples = match raw.metrics.and_then(|m| m.min_samples) {
            None => DEFAULT_MIN_SAMPLES,
            Some(n) => u64::try_from(n)
                .map_err(|_| invalid(format!("metrics.min_samples must be >= 0, got {n}")))?,
        };

        let signals = raw.signals.unwrap_or_default();
        let reward = signals.reward.unwrap_or_else(|| DEFAULT_REWARD.into());
        let penalty = signals.penalty.unwrap_or_else(|| DEFAULT_PENALTY.into());

        let max_delta_per_day = raw.safety.unwrap_or_default().max_delta_per_day;
        if let Some((key, cap)) = max_delta_per_day
            .iter()
            .find(|(_, cap)| !cap.is_finite() || **cap < 0.0)
        {
            return Err(invalid(format!(
                "safety.max_delta_per_day.{key:?} must be a non-negative number, got {cap}"
            )));
        }

        Ok(Self {
            window,
            min_samples,
            reward,
            penalty,
            max_delta_per_day,
        })
    }

    #[must_use]
    pub fn window(&self) -> Window {
        self.window
    }

    #[must_use]
    pub fn min_samples(&self) -> u64 {
        self.min_samples
    }

    #[must_use]
    pub fn reward_expr(&self) -> &str {
        &self.reward
    }

    #[must_use]
    pub fn penalty_expr(&self) -> &str {
        &self.penalty
    }

    #[must_use]
    pub fn with_signals(mut self, reward: impl Into<String>, penalty: impl Into<String>) -> Self {
        self.reward = reward.into();
        self.penalty = penalty.into();
        self
    }

    #[must_use]
    pub fn with_min_samples(mut self, min_samples: u64) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Daily magnitude cap for `key`.
    ///
    /// Exact path first, then any configured key with the same leaf name
    /// (legacy `routing.<leaf>` entries), then the key's built-in default.
    #[must_use]
    pub fn daily_cap(&self, key: ThresholdKey) -> f64 {
        if let Some(cap) = self.max_delta_per_day.get(key.path_str()) {
            return *cap;
        }
        self.max_delta_per_day
            .iter()
            .find(|(name, _)| name.rsplit('.').next() == Some(key.leaf()))
            .map_or_else(|| key.default_daily_cap(), |(_, cap)| *cap)
    }
}
