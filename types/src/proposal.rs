//! Evaluator verdicts and the write-once proposal record.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::profile::KeyPath;

/// Outcome of one evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Insufficient,
    Reward,
    Penalty,
    Neutral,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Verdict::Insufficient => "insufficient",
            Verdict::Reward => "reward",
            Verdict::Penalty => "penalty",
            Verdict::Neutral => "neutral",
        }
    }

    /// Whether this verdict carries deltas.
    #[must_use]
    pub const fn proposes_changes(self) -> bool {
        matches!(self, Verdict::Reward | Verdict::Penalty)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold the evaluator is allowed to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ThresholdKey {
    CallHarmonizersBelow,
    EarlySeveranceBelow,
}

impl ThresholdKey {
    pub const ALL: [ThresholdKey; 2] = [
        ThresholdKey::CallHarmonizersBelow,
        ThresholdKey::EarlySeveranceBelow,
    ];

    /// Path inside a profile.
    #[must_use]
    pub const fn path_str(self) -> &'static str {
        match self {
            ThresholdKey::CallHarmonizersBelow => "gates.triggers.call_harmonizers_below",
            ThresholdKey::EarlySeveranceBelow => "gates.triggers.early_severance_below",
        }
    }

    #[must_use]
    pub fn path(self) -> KeyPath {
        KeyPath::from_static(&["gates", "triggers", self.leaf()])
    }

    #[must_use]
    pub fn leaf(self) -> &'static str {
        match self {
            ThresholdKey::CallHarmonizersBelow => "call_harmonizers_below",
            ThresholdKey::EarlySeveranceBelow => "early_severance_below",
        }
    }

    /// Pattern recorded in proposals; `*` stands for every profile.
    #[must_use]
    pub fn pattern(self) -> String {
        format!("*.{}", self.path_str())
    }

    /// Hard floor and ceiling for the stored value, independent of any daily cap.
    #[must_use]
    pub const fn admissible_range(self) -> (f64, f64) {
        match self {
            ThresholdKey::CallHarmonizersBelow => (0.40, 0.80),
            ThresholdKey::EarlySeveranceBelow => (0.20, 0.35),
        }
    }

    /// Nominal per-run step magnitude.
    #[must_use]
    pub const fn step(self) -> f64 {
        match self {
            ThresholdKey::CallHarmonizersBelow => 0.02,
            ThresholdKey::EarlySeveranceBelow => 0.01,
        }
    }

    /// Daily cap used when the policy does not name one.
    #[must_use]
    pub const fn default_daily_cap(self) -> f64 {
        match self {
            ThresholdKey::CallHarmonizersBelow => 0.04,
            ThresholdKey::EarlySeveranceBelow => 0.02,
        }
    }

    /// Direction of movement on a reward; penalties move the other way.
    ///
    /// Reward lowers the harmonizer-call trigger and raises early severance.
    #[must_use]
    pub const fn reward_sign(self) -> f64 {
        match self {
            ThresholdKey::CallHarmonizersBelow => -1.0,
            ThresholdKey::EarlySeveranceBelow => 1.0,
        }
    }

    fn from_pattern(raw: &str) -> Option<Self> {
        let leaf = raw.rsplit('.').next()?;
        Self::ALL.into_iter().find(|key| key.leaf() == leaf)
    }
}

impl fmt::Display for ThresholdKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_str())
    }
}

impl TryFrom<String> for ThresholdKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_pattern(&value).ok_or_else(|| format!("unknown threshold key pattern {value:?}"))
    }
}

impl From<ThresholdKey> for String {
    fn from(value: ThresholdKey) -> Self {
        value.pattern()
    }
}

/// A signed change proposed for one threshold key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(rename = "key_path_pattern")]
    pub key: ThresholdKey,
    pub delta: f64,
}

/// Durable record of one evaluator run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub created_at: DateTime<Utc>,
    pub window_hours: u32,
    pub sample_count: u64,
    pub coherence_avg: Option<f64>,
    pub mirror_residual_avg: Option<f64>,
    pub verdict: Verdict,
    pub applied: bool,
    pub deltas: Vec<Delta>,
}

/// Sortable, unique proposal name derived from its creation instant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalId(String);

impl ProposalId {
    pub const FILE_SUFFIX: &'static str = "_thresholds.patch.json";

    /// Largest same-second retry suffix; keeps suffixes three digits wide so
    /// names sort in creation order.
    pub const MAX_ATTEMPT: u32 = 999;

    /// Name for `created_at`; `attempt > 0` disambiguates runs within the same second.
    #[must_use]
    pub fn for_instant(created_at: DateTime<Utc>, attempt: u32) -> Self {
        let stamp = created_at.format("%Y%m%d-%H%M%S");
        if attempt == 0 {
            Self(stamp.to_string())
        } else {
            Self(format!("{stamp}-{attempt:03}"))
        }
    }

    /// Recover the id from a proposal file name.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(Self::FILE_SUFFIX)?;
        (!stem.is_empty()).then(|| Self(stem.to_string()))
    }

    /// UTC day encoded in the name, if it is well formed.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.0.get(..8)?, "%Y%m%d").ok()
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}{}", self.0, Self::FILE_SUFFIX)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
