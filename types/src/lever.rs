//! Levers and the multiplier sets applied through them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::InputValidationError;

/// A named scalar multiplier target.
///
/// Every lever is always present in a [`Nudges`] set; absent means 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lever {
    Severance,
    Harmonizers,
    VoiceClarity,
    Coherence,
    Integration,
    Translation,
    Grounding,
    Sealing,
    CallHarmonizersBias,
}

impl Lever {
    pub const ALL: [Lever; 9] = [
        Lever::Severance,
        Lever::Harmonizers,
        Lever::VoiceClarity,
        Lever::Coherence,
        Lever::Integration,
        Lever::Translation,
        Lever::Grounding,
        Lever::Sealing,
        Lever::CallHarmonizersBias,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Lever::Severance => "severance",
            Lever::Harmonizers => "harmonizers",
            Lever::VoiceClarity => "voice_clarity",
            Lever::Coherence => "coherence",
            Lever::Integration => "integration",
            Lever::Translation => "translation",
            Lever::Grounding => "grounding",
            Lever::Sealing => "sealing",
            Lever::CallHarmonizersBias => "call_harmonizers_bias",
        }
    }
}

impl fmt::Display for Lever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive bounds for lever multipliers.
///
/// Invariant: `0 < lo <= hi`, both finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NudgeCaps {
    lo: f64,
    hi: f64,
}

impl NudgeCaps {
    pub const DEFAULT_LO: f64 = 0.85;
    pub const DEFAULT_HI: f64 = 1.15;

    pub fn new(lo: f64, hi: f64) -> Result<Self, InputValidationError> {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(InputValidationError::NonFiniteCaps { lo, hi });
        }
        if lo <= 0.0 || hi <= 0.0 {
            return Err(InputValidationError::NonPositiveCaps { lo, hi });
        }
        if lo > hi {
            return Err(InputValidationError::InvertedCaps { lo, hi });
        }
        Ok(Self { lo, hi })
    }

    #[must_use]
    pub const fn lo(self) -> f64 {
        self.lo
    }

    #[must_use]
    pub const fn hi(self) -> f64 {
        self.hi
    }

    #[must_use]
    pub fn clamp(self, value: f64) -> f64 {
        value.clamp(self.lo, self.hi)
    }
}

impl Default for NudgeCaps {
    fn default() -> Self {
        Self {
            lo: Self::DEFAULT_LO,
            hi: Self::DEFAULT_HI,
        }
    }
}

/// A complete lever -> multiplier mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nudges(BTreeMap<Lever, f64>);

impl Nudges {
    /// All levers at 1.0.
    #[must_use]
    pub fn neutral() -> Self {
        Self(Lever::ALL.iter().map(|&lever| (lever, 1.0)).collect())
    }

    /// Neutral set with the listed levers overridden.
    #[must_use]
    pub fn with(overrides: &[(Lever, f64)]) -> Self {
        let mut nudges = Self::neutral();
        for &(lever, value) in overrides {
            nudges.0.insert(lever, value);
        }
        nudges
    }

    #[must_use]
    pub fn get(&self, lever: Lever) -> f64 {
        self.0.get(&lever).copied().unwrap_or(1.0)
    }

    /// Every multiplier clamped into `caps`.
    #[must_use]
    pub fn clamped(&self, caps: NudgeCaps) -> Self {
        Self(
            Lever::ALL
                .iter()
                .map(|&lever| (lever, caps.clamp(self.get(lever))))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lever, f64)> + '_ {
        Lever::ALL.iter().map(|&lever| (lever, self.get(lever)))
    }
}

impl Default for Nudges {
    fn default() -> Self {
        Self::neutral()
    }
}
