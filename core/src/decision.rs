//! Verdict selection and delta derivation.

use std::collections::BTreeMap;
use std::fmt;

use tidegate_config::TuningPolicy;
use tidegate_types::{Delta, ThresholdKey, Verdict};

use crate::aggregate::Aggregate;
use crate::predicate::{Bindings, Predicate, PredicateError};

/// Which configured signal an expression came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Reward,
    Penalty,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Reward => "reward",
            Signal::Penalty => "penalty",
        })
    }
}

/// The rule that produced a verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionBasis {
    /// No record in the window carried one of the two scores.
    MissingAverages,
    TooFewSamples { have: u64, need: u64 },
    RewardMatched,
    PenaltyMatched,
    NoMatch,
    /// A signal failed to compile or evaluate; the run falls back to neutral.
    PredicateFailed {
        signal: Signal,
        error: PredicateError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub verdict: Verdict,
    pub basis: DecisionBasis,
}

impl Decision {
    fn new(verdict: Verdict, basis: DecisionBasis) -> Self {
        Self { verdict, basis }
    }
}

fn check(signal: Signal, source: &str, bindings: Bindings) -> Result<bool, DecisionBasis> {
    Predicate::compile(source)
        .and_then(|predicate| predicate.evaluate(bindings))
        .map_err(|error| {
            tracing::warn!(%signal, expr = source, "Predicate failed; verdict is neutral: {error}");
            DecisionBasis::PredicateFailed { signal, error }
        })
}

/// Pick a verdict for `aggregate` under `policy`.
///
/// Reward is tested before penalty. Any predicate failure short-circuits to
/// neutral.
#[must_use]
pub fn decide(aggregate: &Aggregate, policy: &TuningPolicy) -> Decision {
    let (Some(coh), Some(mir)) = (aggregate.coherence_avg, aggregate.mirror_residual_avg) else {
        return Decision::new(Verdict::Insufficient, DecisionBasis::MissingAverages);
    };
    if aggregate.sample_count < policy.min_samples() {
        return Decision::new(
            Verdict::Insufficient,
            DecisionBasis::TooFewSamples {
                have: aggregate.sample_count,
                need: policy.min_samples(),
            },
        );
    }

    let bindings = Bindings { coh, mir };
    let basis = match check(Signal::Reward, policy.reward_expr(), bindings) {
        Ok(true) => DecisionBasis::RewardMatched,
        Ok(false) => match check(Signal::Penalty, policy.penalty_expr(), bindings) {
            Ok(true) => DecisionBasis::PenaltyMatched,
            Ok(false) => DecisionBasis::NoMatch,
            Err(failed) => failed,
        },
        Err(failed) => failed,
    };
    let verdict = match basis {
        DecisionBasis::RewardMatched => Verdict::Reward,
        DecisionBasis::PenaltyMatched => Verdict::Penalty,
        _ => Verdict::Neutral,
    };
    Decision::new(verdict, basis)
}

/// Magnitude already moved per key today by applied proposals.
pub type DailyUsage = BTreeMap<ThresholdKey, f64>;

/// Signed deltas for `verdict`, in [`ThresholdKey::ALL`] order.
///
/// Each magnitude is `min(step, cap, cap - used)`, never below zero. Keys are
/// kept even when today's budget is spent so a rewarding or penalising
/// verdict always lists both keys.
#[must_use]
pub fn derive_deltas(verdict: Verdict, policy: &TuningPolicy, used: &DailyUsage) -> Vec<Delta> {
    if !verdict.proposes_changes() {
        return Vec::new();
    }
    let direction = if verdict == Verdict::Reward {
        1.0
    } else {
        -1.0
    };

    ThresholdKey::ALL
        .into_iter()
        .map(|key| {
            let cap = policy.daily_cap(key).abs();
            let spent = used.get(&key).copied().unwrap_or(0.0);
            let remaining = round_to((cap - spent).max(0.0), 6);
            let magnitude = key.step().min(cap).min(remaining);
            let delta = direction * key.reward_sign() * magnitude;
            if remaining < cap {
                tracing::debug!(key = %key, cap, spent, magnitude, "Daily budget limits delta");
            }
            Delta {
                key,
                // Avoid writing -0.0 when the budget is exhausted.
                delta: if magnitude == 0.0 { 0.0 } else { delta },
            }
        })
        .collect()
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}
