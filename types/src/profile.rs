//! Threshold profiles: named, nested numeric mappings consumed by the agent's gates.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::InputValidationError;

/// Dot-separated path into a nested profile, e.g. `gates.triggers.early_severance_below`.
///
/// Invariant: at least one segment, no segment empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn parse(raw: &str) -> Result<Self, InputValidationError> {
        let segments: Vec<String> = raw.trim().split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(InputValidationError::KeyPath {
                raw: raw.to_string(),
            });
        }
        Ok(Self(segments))
    }

    /// Caller guarantees every segment is non-empty.
    pub(crate) fn from_static(segments: &[&'static str]) -> Self {
        Self(segments.iter().map(|s| (*s).to_string()).collect())
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last segment.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }
}

impl FromStr for KeyPath {
    type Err = InputValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// One node of a profile tree.
///
/// Non-numeric leaves (flags, labels) are carried through untouched so a
/// profile survives a nudge without losing fields the tuner does not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdNode {
    Number(f64),
    Table(BTreeMap<String, ThresholdNode>),
    Other(serde_json::Value),
}

/// A named set of nested numeric thresholds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdProfile(BTreeMap<String, ThresholdNode>);

impl ThresholdProfile {
    /// Numeric value at `path`, if the path exists and ends in a number.
    #[must_use]
    pub fn get(&self, path: &KeyPath) -> Option<f64> {
        let (leaf, parents) = path.segments().split_last()?;
        let mut table = &self.0;
        for segment in parents {
            match table.get(segment)? {
                ThresholdNode::Table(inner) => table = inner,
                _ => return None,
            }
        }
        match table.get(leaf)? {
            ThresholdNode::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Replace the number at `path` with `f(old)`.
    ///
    /// Returns the old value, or `None` (leaving the profile untouched) when
    /// the path is absent or not numeric.
    pub fn update(&mut self, path: &KeyPath, f: impl FnOnce(f64) -> f64) -> Option<f64> {
        let (leaf, parents) = path.segments().split_last()?;
        let mut table = &mut self.0;
        for segment in parents {
            match table.get_mut(segment)? {
                ThresholdNode::Table(inner) => table = inner,
                _ => return None,
            }
        }
        match table.get_mut(leaf)? {
            ThresholdNode::Number(value) => {
                let old = *value;
                *value = f(old);
                Some(old)
            }
            _ => None,
        }
    }
}
