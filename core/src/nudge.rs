//! Nudge applicator: transient multiplicative bias over a threshold profile.
//!
//! Never persists anything. The input profile is left untouched so callers
//! can compare against it or roll back to it.

use std::collections::BTreeMap;

use tidegate_types::{KeyPath, Lever, NudgeCaps, Nudges, ThresholdProfile};

/// Floor on the call-harmonizers bias before it is used as a divisor.
const MIN_CALL_BIAS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Multiply,
    /// Inverse relationship: a stronger bias lowers the trigger.
    Divide,
}

/// (path, lever, op). Paths absent from a profile are skipped.
const RULES: [(&str, Lever, Op); 5] = [
    ("meta_gate.coherence.warn_below", Lever::Coherence, Op::Multiply),
    ("meta_gate.coherence.sever_below", Lever::Coherence, Op::Multiply),
    ("meta_gate.coherence.stabilize_above", Lever::Coherence, Op::Multiply),
    ("gates.triggers.early_severance_below", Lever::Severance, Op::Multiply),
    ("gates.triggers.call_harmonizers_below", Lever::CallHarmonizersBias, Op::Divide),
];

/// One field changed by a nudge.
#[derive(Debug, Clone, PartialEq)]
pub struct NudgedField {
    pub path: KeyPath,
    pub lever: Lever,
    pub multiplier: f64,
    pub before: f64,
    pub after: f64,
}

/// Apply `levers` (clamped into `caps`) to a copy of `profile`.
#[must_use]
pub fn apply(levers: &Nudges, profile: &ThresholdProfile, caps: NudgeCaps) -> ThresholdProfile {
    apply_with_report(levers, profile, caps).0
}

/// [`apply`], also returning every field it touched.
#[must_use]
pub fn apply_with_report(
    levers: &Nudges,
    profile: &ThresholdProfile,
    caps: NudgeCaps,
) -> (ThresholdProfile, Vec<NudgedField>) {
    let levers = levers.clamped(caps);
    let mut out = profile.clone();
    let mut touched = Vec::new();

    for (raw_path, lever, op) in RULES {
        let Ok(path) = KeyPath::parse(raw_path) else {
            continue;
        };
        let multiplier = levers.get(lever);
        let changed = out.update(&path, |value| match op {
            Op::Multiply => value * multiplier,
            Op::Divide => value / multiplier.max(MIN_CALL_BIAS),
        });
        if let Some(before) = changed {
            let after = out.get(&path).unwrap_or(before);
            tracing::debug!(path = %path, lever = %lever, before, after, "Nudged threshold");
            touched.push(NudgedField {
                path,
                lever,
                multiplier,
                before,
                after,
            });
        }
    }

    (out, touched)
}

/// Nudge every profile in a set, returning a new set.
#[must_use]
pub fn apply_all(
    levers: &Nudges,
    profiles: &BTreeMap<String, ThresholdProfile>,
    caps: NudgeCaps,
) -> BTreeMap<String, ThresholdProfile> {
    profiles
        .iter()
        .map(|(name, profile)| (name.clone(), apply(levers, profile, caps)))
        .collect()
}
