//! Phase oracle and nudge composition

use chrono::{Duration, TimeZone, Utc};
use tidegate_config::{ApplyAuthorization, ProfileStore};
use tidegate_core::phase::{self, Phase, phase_fraction, phase_name};
use tidegate_core::{Evaluator, nudge};
use tidegate_types::{KeyPath, Lever, NudgeCaps};

use crate::common::{Fixture, approx, now};

fn key(raw: &str) -> KeyPath {
    KeyPath::parse(raw).unwrap()
}

#[test]
fn scenario_d_reference_epoch_is_new_moon() {
    let ts = tidegate_types::parse_timestamp("2000-01-06T18:14:00Z").unwrap();
    assert_eq!(phase_fraction(Some(ts)), 0.0);
    assert_eq!(phase_name(phase_fraction(Some(ts))), "New Moon");
}

#[test]
fn naive_and_zoned_timestamps_agree() {
    let naive = tidegate_types::parse_timestamp("2025-10-19T12:00:00").unwrap();
    let zoned = tidegate_types::parse_timestamp("2025-10-19T14:00:00+02:00").unwrap();
    assert_eq!(phase_fraction(Some(naive)), phase_fraction(Some(zoned)));
}

#[test]
fn phases_advance_in_cyclic_order() {
    let start = Utc.with_ymd_and_hms(2000, 1, 6, 18, 14, 0).unwrap();
    let step_ms = (phase::SYNODIC_MONTH_DAYS * 86_400_000.0 / 8.0) as i64;
    let names: Vec<_> = (0..9)
        .map(|i| start + Duration::milliseconds(step_ms * i + 1_000))
        .map(|at| Phase::from_fraction(phase_fraction(Some(at))))
        .collect();
    assert_eq!(&names[..8], &Phase::ALL);
    assert_eq!(names[8], Phase::NewMoon);
}

#[test]
fn nudged_profile_is_a_fresh_value_over_the_store() {
    let fixture = Fixture::new();
    let store = ProfileStore::load(fixture.paths.profile_store()).unwrap();
    let profiles = store.snapshot().unwrap();

    let nudged = nudge::apply_all(&Phase::FullMoon.biases(), &profiles, NudgeCaps::default());

    let call = key("gates.triggers.call_harmonizers_below");
    assert!(approx(nudged["default"].get(&call).unwrap(), 0.62 / 1.12));
    assert_eq!(profiles["default"].get(&call), Some(0.62));
    // The flat legacy profile has no nested gates, so nothing applies.
    assert_eq!(nudged["legacy"], profiles["legacy"]);
}

#[test]
fn learned_delta_then_transient_nudge_compose_in_order() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);
    Evaluator::new(fixture.paths.clone())
        .run_at(now(), ApplyAuthorization::Apply)
        .unwrap();

    let profiles = ProfileStore::load(fixture.paths.profile_store())
        .unwrap()
        .snapshot()
        .unwrap();
    let levers = Phase::NewMoon.biases();
    let caps = NudgeCaps::new(0.9, 1.05).unwrap();
    let nudged = nudge::apply_all(&levers, &profiles, caps);

    let sev = key("gates.triggers.early_severance_below");
    // Stored value carries the learned +0.01; the nudge multiplies by the capped 1.05.
    assert_eq!(profiles["default"].get(&sev), Some(0.26));
    assert!(approx(nudged["default"].get(&sev).unwrap(), 0.26 * 1.05));
    assert_eq!(levers.clamped(caps).get(Lever::Severance), 1.05);
}
