//! Lunar phase oracle.
//!
//! Mean synodic month of 29.530588853 days measured from the new moon of
//! 2000-01-06 18:14:00Z (Meeus). Fraction 0 is new, 0.5 is full.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use tidegate_types::{NudgeCaps, Nudges};

/// Mean synodic month, days.
pub const SYNODIC_MONTH_DAYS: f64 = 29.530588853;

/// Unix seconds of the reference new moon, 2000-01-06T18:14:00Z.
pub const REFERENCE_NEW_MOON_UNIX: i64 = 947_182_440;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// The reference new moon as an instant.
#[must_use]
pub fn reference_new_moon() -> DateTime<Utc> {
    DateTime::from_timestamp(REFERENCE_NEW_MOON_UNIX, 0).unwrap_or_default()
}

/// Position within the synodic cycle, in `[0, 1)`. `None` means now.
#[must_use]
pub fn phase_fraction(ts: Option<DateTime<Utc>>) -> f64 {
    let t = ts.unwrap_or_else(Utc::now);
    // Integer seconds first so large offsets keep sub-second precision.
    let elapsed = (t.timestamp() - REFERENCE_NEW_MOON_UNIX) as f64
        + f64::from(t.timestamp_subsec_nanos()) / 1e9;
    let days = elapsed / SECONDS_PER_DAY;
    let fraction = days.rem_euclid(SYNODIC_MONTH_DAYS) / SYNODIC_MONTH_DAYS;
    // rem_euclid can round up to the modulus for tiny negative inputs.
    if fraction >= 1.0 { 0.0 } else { fraction }
}

/// One of the eight named phases, in cyclic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    LastQuarter,
    WaningCrescent,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::NewMoon,
        Phase::WaxingCrescent,
        Phase::FirstQuarter,
        Phase::WaxingGibbous,
        Phase::FullMoon,
        Phase::WaningGibbous,
        Phase::LastQuarter,
        Phase::WaningCrescent,
    ];

    /// Nearest of eight bins, wrapping so fractions near 1.0 land on New Moon.
    ///
    /// Halfway points round to the later bin.
    #[must_use]
    pub fn from_fraction(fraction: f64) -> Self {
        let bin = (fraction * 8.0 + 0.5).floor() as i64;
        Self::ALL[bin.rem_euclid(8) as usize]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::NewMoon => "New Moon",
            Phase::WaxingCrescent => "Waxing Crescent",
            Phase::FirstQuarter => "First Quarter",
            Phase::WaxingGibbous => "Waxing Gibbous",
            Phase::FullMoon => "Full Moon",
            Phase::WaningGibbous => "Waning Gibbous",
            Phase::LastQuarter => "Last Quarter",
            Phase::WaningCrescent => "Waning Crescent",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|phase| phase.name() == name)
    }

    /// Fixed lever multipliers for this phase; unlisted levers stay at 1.0.
    #[must_use]
    pub fn biases(self) -> Nudges {
        use tidegate_types::Lever::{
            CallHarmonizersBias, Coherence, Grounding, Harmonizers, Integration, Sealing,
            Severance, Translation, VoiceClarity,
        };
        match self {
            Phase::NewMoon => Nudges::with(&[
                (Severance, 1.10),
                (Harmonizers, 0.95),
                (Grounding, 1.05),
            ]),
            Phase::WaxingCrescent => Nudges::with(&[(VoiceClarity, 1.05), (Translation, 1.03)]),
            Phase::FirstQuarter => Nudges::with(&[(Coherence, 1.05), (Grounding, 1.03)]),
            Phase::WaxingGibbous => Nudges::with(&[(Integration, 1.05), (Coherence, 1.02)]),
            Phase::FullMoon => Nudges::with(&[
                (Severance, 0.90),
                (Harmonizers, 1.10),
                (CallHarmonizersBias, 1.12),
            ]),
            Phase::WaningGibbous => Nudges::with(&[(Translation, 1.05), (Integration, 1.02)]),
            Phase::LastQuarter => Nudges::with(&[(Grounding, 1.07), (VoiceClarity, 0.98)]),
            Phase::WaningCrescent => Nudges::with(&[(Sealing, 1.05), (Severance, 1.03)]),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Phase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Name of the phase at `fraction`.
#[must_use]
pub fn phase_name(fraction: f64) -> &'static str {
    Phase::from_fraction(fraction).name()
}

/// Lever table for a phase name; `None` for names outside the fixed eight.
#[must_use]
pub fn bias_table(name: &str) -> Option<Nudges> {
    Phase::from_name(name).map(Phase::biases)
}

/// Point-in-time phase reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSnapshot {
    pub phase_fraction: f64,
    pub phase_name: Phase,
    pub nudges: Nudges,
    pub timestamp: String,
}

/// Phase reading at `ts` (now if `None`), with nudges clamped when `caps` is given.
#[must_use]
pub fn sample(ts: Option<DateTime<Utc>>, caps: Option<NudgeCaps>) -> PhaseSnapshot {
    let t = ts.unwrap_or_else(Utc::now);
    let fraction = phase_fraction(Some(t));
    let phase = Phase::from_fraction(fraction);
    let raw = phase.biases();
    PhaseSnapshot {
        phase_fraction: fraction,
        phase_name: phase,
        nudges: match caps {
            Some(caps) => raw.clamped(caps),
            None => raw,
        },
        timestamp: t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
    }
}
