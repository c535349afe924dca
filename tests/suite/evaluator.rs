//! Self-learning evaluator runs against a seeded project root

use chrono::Duration;
use tidegate_config::ApplyAuthorization;
use tidegate_core::{DecisionBasis, Evaluator, EvaluatorError, Signal};
use tidegate_types::{ThresholdKey, Verdict};

use crate::common::{Fixture, approx, now};

const CALL: ThresholdKey = ThresholdKey::CallHarmonizersBelow;
const SEVER: ThresholdKey = ThresholdKey::EarlySeveranceBelow;

fn delta(deltas: &[tidegate_types::Delta], key: ThresholdKey) -> f64 {
    deltas
        .iter()
        .find(|d| d.key == key)
        .map(|d| d.delta)
        .expect("delta for key")
}

fn evaluate(fixture: &Fixture, auth: ApplyAuthorization) -> tidegate_core::RunReport {
    Evaluator::new(fixture.paths.clone())
        .run_at(now(), auth)
        .expect("evaluation succeeds")
}

#[test]
fn scenario_a_good_window_is_rewarded() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    let proposal = &report.proposal;

    assert_eq!(proposal.verdict, Verdict::Reward);
    assert_eq!(report.decision.basis, DecisionBasis::RewardMatched);
    assert_eq!(proposal.sample_count, 25);
    assert!(approx(proposal.coherence_avg.unwrap(), 0.92));
    assert!(approx(proposal.mirror_residual_avg.unwrap(), 0.20));
    assert_eq!(delta(&proposal.deltas, CALL), -0.02);
    assert_eq!(delta(&proposal.deltas, SEVER), 0.01);
    assert!(!proposal.applied);
}

#[test]
fn scenario_b_poor_coherence_is_penalised() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.40, 0.20, 1);

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);

    assert_eq!(report.proposal.verdict, Verdict::Penalty);
    assert_eq!(delta(&report.proposal.deltas, CALL), 0.02);
    assert_eq!(delta(&report.proposal.deltas, SEVER), -0.01);
}

#[test]
fn scenario_c_too_few_samples_never_applies() {
    let fixture = Fixture::new();
    fixture.add_turns(10, 0.99, 0.01, 1);
    let before = fixture.store_text();

    let report = evaluate(&fixture, ApplyAuthorization::Apply);

    assert_eq!(report.proposal.verdict, Verdict::Insufficient);
    assert_eq!(
        report.decision.basis,
        DecisionBasis::TooFewSamples { have: 10, need: 20 }
    );
    assert!(report.proposal.deltas.is_empty());
    assert!(!report.proposal.applied);
    assert_eq!(fixture.store_text(), before);
}

#[test]
fn sample_count_sums_record_weights() {
    let fixture = Fixture::new();
    let ts = crate::common::iso(now() - Duration::hours(1));
    fixture.append_telemetry(&format!(
        "{{\"timestamp\":\"{ts}\",\"coherence\":0.95,\"mirror_residual\":0.1,\"samples\":12}}\n\
         {{\"ts\":\"{ts}\",\"coherence\":0.91,\"mirror_residual\":0.2,\"sample_count\":9}}\n"
    ));

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    assert_eq!(report.aggregate.records, 2);
    assert_eq!(report.proposal.sample_count, 21);
    assert_eq!(report.proposal.verdict, Verdict::Reward);
}

#[test]
fn records_outside_the_window_are_ignored() {
    let fixture = Fixture::new();
    fixture.add_turns(30, 0.95, 0.10, 30);
    fixture.add_turns(5, 0.95, 0.10, 1);

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    assert_eq!(report.proposal.sample_count, 5);
    assert_eq!(report.proposal.verdict, Verdict::Insufficient);
}

#[test]
fn empty_window_is_insufficient_with_no_averages() {
    let fixture = Fixture::new();

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    assert_eq!(report.proposal.verdict, Verdict::Insufficient);
    assert_eq!(report.decision.basis, DecisionBasis::MissingAverages);
    assert_eq!(report.proposal.coherence_avg, None);
    assert!(fixture.audit_lines()[0].contains("coh=n/a mir=n/a"));
}

#[test]
fn corrupt_lines_are_skipped_not_fatal() {
    let fixture = Fixture::new();
    fixture.add_turns(12, 0.92, 0.20, 1);
    fixture.append_telemetry("{broken\nnot json at all\n{\"coherence\":0.9}\n");
    let nudge = serde_json::json!({
        "timestamp": "2025-10-19T11:00:00Z",
        "event": "lunar_nudge",
        "phase": "Full Moon"
    });
    fixture.append_telemetry(&format!("{nudge}\n"));
    fixture.add_turns(13, 0.92, 0.20, 2);

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(report.proposal.sample_count, 25);
    assert_eq!(report.proposal.verdict, Verdict::Reward);
}

#[test]
fn broken_predicate_degrades_to_neutral() {
    let fixture = Fixture::new();
    fixture.write_policy("[signals]\nreward = \"coh >=\"\npenalty = \"coh < 0.55\"\n");
    fixture.add_turns(25, 0.40, 0.20, 1);

    let report = evaluate(&fixture, ApplyAuthorization::Apply);
    assert_eq!(report.proposal.verdict, Verdict::Neutral);
    assert!(matches!(
        report.decision.basis,
        DecisionBasis::PredicateFailed {
            signal: Signal::Reward,
            ..
        }
    ));
    assert!(report.proposal.deltas.is_empty());
    assert!(!report.proposal.applied);
}

#[test]
fn runs_over_the_same_window_are_deterministic() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let first = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    let second = evaluate(&fixture, ApplyAuthorization::ProposeOnly);

    assert_eq!(first.proposal, second.proposal);
    assert_ne!(first.proposal_id, second.proposal_id);
    assert_eq!(fixture.proposal_files().len(), 2);
}

#[test]
fn proposals_are_never_overwritten() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let first = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    let original = std::fs::read(&first.proposal_path).unwrap();
    fixture.add_turns(25, 0.30, 0.90, 0);
    let second = evaluate(&fixture, ApplyAuthorization::ProposeOnly);

    assert_eq!(std::fs::read(&first.proposal_path).unwrap(), original);
    assert_ne!(first.proposal_path, second.proposal_path);
    assert_eq!(
        second.proposal_id.as_str(),
        format!("{}-001", first.proposal_id.as_str())
    );
}

#[test]
fn proposal_file_has_the_documented_shape() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);
    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);

    let json: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&report.proposal_path).unwrap()).unwrap();
    assert_eq!(json["created_at"], "2025-10-19T12:00:00Z");
    assert_eq!(json["window_hours"], 24);
    assert_eq!(json["sample_count"], 25);
    assert_eq!(json["verdict"], "reward");
    assert_eq!(json["applied"], false);
    assert_eq!(
        json["deltas"][0]["key_path_pattern"],
        "*.gates.triggers.call_harmonizers_below"
    );
    assert_eq!(json["deltas"][1]["delta"], 0.01);
    assert!(
        report
            .proposal_path
            .ends_with("thread/patches/20251019-120000_thresholds.patch.json")
    );
}

#[test]
fn apply_clamps_to_admissible_ranges_and_keeps_layout() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let report = evaluate(&fixture, ApplyAuthorization::Apply);
    assert!(report.proposal.applied);
    assert!(Fixture::read_proposal(&report.proposal_path).applied);

    let store = fixture.store_text();
    assert!(store.starts_with("# live thresholds"));
    assert!(store.contains("call_harmonizers_below = 0.6 # tuned by hand"));
    assert!(store.contains("early_severance_below = 0.26"));
    // Flat legacy profile: call moves, severance already at its ceiling.
    assert!(store.contains("call_harmonizers_below = 0.77"));
    assert!(store.contains("early_severance_below = 0.35"));

    let changed: Vec<_> = report
        .changes
        .iter()
        .map(|c| (c.profile.as_str(), c.key))
        .collect();
    assert_eq!(changed.len(), 3);
    assert!(changed.contains(&("legacy", CALL)));
    assert!(!changed.contains(&("legacy", SEVER)));
    for change in &report.changes {
        let (lo, hi) = change.key.admissible_range();
        assert!((lo..=hi).contains(&change.new));
    }
}

#[test]
fn apply_without_deltas_leaves_store_untouched() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.70, 0.40, 1);
    let before = fixture.store_text();

    let report = evaluate(&fixture, ApplyAuthorization::Apply);
    assert_eq!(report.proposal.verdict, Verdict::Neutral);
    assert!(!report.proposal.applied);
    assert_eq!(fixture.store_text(), before);
}

#[test]
fn daily_budget_is_shared_across_applied_runs() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let runs: Vec<_> = (0..3)
        .map(|_| evaluate(&fixture, ApplyAuthorization::Apply))
        .collect();

    assert_eq!(delta(&runs[0].proposal.deltas, CALL), -0.02);
    assert_eq!(delta(&runs[1].proposal.deltas, CALL), -0.02);
    assert_eq!(delta(&runs[2].proposal.deltas, CALL), 0.0);
    assert_eq!(delta(&runs[2].proposal.deltas, SEVER), 0.0);
    assert_eq!(runs[2].proposal.verdict, Verdict::Reward);
    assert!(!runs[2].proposal.applied);

    let total: f64 = runs
        .iter()
        .map(|r| delta(&r.proposal.deltas, CALL).abs())
        .sum();
    assert!(total <= 0.04 + 1e-12);
    assert!(fixture.store_text().contains("call_harmonizers_below = 0.58 # tuned by hand"));
}

#[test]
fn propose_only_runs_do_not_consume_budget() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    for _ in 0..3 {
        let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
        assert_eq!(delta(&report.proposal.deltas, CALL), -0.02);
    }
}

#[test]
fn configured_cap_bounds_each_delta() {
    let fixture = Fixture::new();
    fixture.write_policy(
        "[safety.max_delta_per_day]\n\
         \"routing.call_harmonizers_below\" = 0.015\n\
         \"routing.early_severance_below\" = 0.004\n",
    );
    fixture.add_turns(25, 0.30, 0.20, 1);

    let report = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    assert_eq!(report.proposal.verdict, Verdict::Penalty);
    assert_eq!(delta(&report.proposal.deltas, CALL), 0.015);
    assert_eq!(delta(&report.proposal.deltas, SEVER), -0.004);
}

#[test]
fn every_run_appends_one_audit_line() {
    let fixture = Fixture::new();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let first = evaluate(&fixture, ApplyAuthorization::ProposeOnly);
    evaluate(&fixture, ApplyAuthorization::Apply);

    let lines = fixture.audit_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        format!(
            "- 2025-10-19T12:00:00Z verdict=reward samples=25 coh=0.920 mir=0.200 \
             proposals=2 patch={} applied=false",
            first.proposal_id.file_name()
        )
    );
    assert!(lines[1].ends_with("applied=true"));
}

#[test]
fn missing_policy_is_fatal_and_writes_nothing() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.paths.policy()).unwrap();
    fixture.add_turns(25, 0.92, 0.20, 1);

    let err = Evaluator::new(fixture.paths.clone())
        .run_at(now(), ApplyAuthorization::ProposeOnly)
        .unwrap_err();
    assert!(err.is_missing_input());
    assert_eq!(err.path(), Some(fixture.paths.policy()));
    assert!(err.to_string().contains("tuning policy not found"));
    assert!(fixture.proposal_files().is_empty());
    assert!(fixture.audit_lines().is_empty());
}

#[test]
fn missing_telemetry_is_fatal() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.paths.telemetry()).unwrap();

    let err = Evaluator::new(fixture.paths.clone())
        .run_at(now(), ApplyAuthorization::ProposeOnly)
        .unwrap_err();
    assert!(matches!(err, EvaluatorError::Telemetry(_)));
    assert!(err.is_missing_input());
    assert_eq!(err.path(), Some(fixture.paths.telemetry()));
}

#[test]
fn missing_store_is_fatal_only_when_applying() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.paths.profile_store()).unwrap();
    fixture.add_turns(25, 0.92, 0.20, 1);

    evaluate(&fixture, ApplyAuthorization::ProposeOnly);

    let err = Evaluator::new(fixture.paths.clone())
        .run_at(now(), ApplyAuthorization::Apply)
        .unwrap_err();
    assert!(err.is_missing_input());
    assert_eq!(fixture.proposal_files().len(), 1);
}

#[test]
fn malformed_policy_is_fatal() {
    let fixture = Fixture::new();
    fixture.write_policy("[schedule\nwindow = ");

    let err = Evaluator::new(fixture.paths.clone())
        .run_at(now(), ApplyAuthorization::ProposeOnly)
        .unwrap_err();
    assert!(matches!(
        err,
        EvaluatorError::Config(tidegate_config::ConfigError::Malformed { .. })
    ));
}

#[test]
fn oversized_window_is_a_config_error_not_a_crash() {
    let fixture = Fixture::new();
    fixture.write_policy("[schedule]\nwindow = \"170000000d\"\n");

    let err = Evaluator::new(fixture.paths.clone())
        .run_at(now(), ApplyAuthorization::Apply)
        .unwrap_err();
    assert!(matches!(
        err,
        EvaluatorError::Config(tidegate_config::ConfigError::Invalid { .. })
    ));
    assert_eq!(err.path(), Some(fixture.paths.policy()));
    assert!(fixture.proposal_files().is_empty());
    assert!(fixture.audit_lines().is_empty());
}
