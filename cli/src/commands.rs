//! Subcommand bodies. Each prints one JSON document to stdout.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tidegate_config::{ApplyAuthorization, LunarConfig, ProfileStore, TunerPaths};
use tidegate_core::telemetry::{append_event, append_turn};
use tidegate_core::{AppliedChange, Evaluator, PhaseSnapshot, nudge, phase};
use tidegate_types::{
    NudgeCaps, Nudges, Proposal, TelemetryRecord, ThresholdProfile, parse_timestamp,
};

const LUNAR_EVENT: &str = "lunar_nudge";

fn instant(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        Some(raw) => Ok(parse_timestamp(raw)?),
        None => Ok(Utc::now()),
    }
}

fn parse_caps(raw: Option<&[f64]>) -> Result<Option<NudgeCaps>> {
    match raw {
        None => Ok(None),
        Some(&[lo, hi]) => Ok(Some(NudgeCaps::new(lo, hi)?)),
        Some(other) => bail!("--caps takes exactly two values, got {}", other.len()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

pub fn run_phase(iso: Option<&str>, raw_caps: Option<&[f64]>) -> Result<()> {
    let at = instant(iso)?;
    let snapshot = phase::sample(Some(at), parse_caps(raw_caps)?);
    print_json(&snapshot)
}

pub struct NudgeArgs<'a> {
    pub iso: Option<&'a str>,
    pub caps: Option<&'a [f64]>,
    pub profile: Option<&'a str>,
    pub profile_file: Option<&'a Path>,
}

#[derive(Serialize)]
struct NudgeOutput<'a> {
    #[serde(flatten)]
    snapshot: &'a PhaseSnapshot,
    enabled: bool,
    profiles: BTreeMap<String, ThresholdProfile>,
}

#[derive(Serialize)]
struct LunarEvent<'a> {
    phase: &'a str,
    phase_fraction: f64,
    nudges: &'a Nudges,
}

fn load_profiles(
    paths: &TunerPaths,
    args: &NudgeArgs<'_>,
) -> Result<BTreeMap<String, ThresholdProfile>> {
    if let Some(path) = args.profile_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile file {}", path.display()))?;
        let profile: ThresholdProfile = toml::from_str(&text)
            .with_context(|| format!("profile file {} is malformed", path.display()))?;
        let name = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => "profile".to_string(),
        };
        return Ok(BTreeMap::from([(name, profile)]));
    }

    let mut profiles = ProfileStore::load(paths.profile_store())?.snapshot()?;
    if let Some(name) = args.profile {
        let Some(profile) = profiles.remove(name) else {
            bail!(
                "profile {name:?} not found in {}",
                paths.profile_store().display()
            );
        };
        return Ok(BTreeMap::from([(name.to_string(), profile)]));
    }
    Ok(profiles)
}

pub fn run_nudge(paths: &TunerPaths, args: &NudgeArgs<'_>) -> Result<()> {
    let config = LunarConfig::load_or_default(paths.lunar())?;
    let caps = parse_caps(args.caps)?.unwrap_or(config.caps());
    let at = instant(args.iso)?;
    let profiles = load_profiles(paths, args)?;

    let mut snapshot = phase::sample(Some(at), Some(caps));
    if !config.enabled() {
        tracing::info!("Lunar nudges disabled; profiles pass through unchanged");
        snapshot.nudges = Nudges::neutral();
    }
    let nudged = nudge::apply_all(&snapshot.nudges, &profiles, caps);

    if config.enabled() && config.log() {
        let event = LunarEvent {
            phase: snapshot.phase_name.name(),
            phase_fraction: snapshot.phase_fraction,
            nudges: &snapshot.nudges,
        };
        // Logging the nudge is best effort; the computed profiles still print.
        if let Err(err) = append_event(paths.telemetry(), at, LUNAR_EVENT, &event) {
            tracing::warn!(path = %paths.telemetry().display(), "Failed to log lunar nudge: {err}");
        }
    }

    print_json(&NudgeOutput {
        snapshot: &snapshot,
        enabled: config.enabled(),
        profiles: nudged,
    })
}

#[derive(Serialize)]
struct ChangeOutput<'a> {
    profile: &'a str,
    key: String,
    old: f64,
    new: f64,
}

impl<'a> From<&'a AppliedChange> for ChangeOutput<'a> {
    fn from(change: &'a AppliedChange) -> Self {
        Self {
            profile: &change.profile,
            key: change.path.to_string(),
            old: change.old,
            new: change.new,
        }
    }
}

#[derive(Serialize)]
struct EvaluateOutput<'a> {
    proposal_id: &'a str,
    proposal_path: String,
    #[serde(flatten)]
    proposal: &'a Proposal,
    skipped_lines: usize,
    changes: Vec<ChangeOutput<'a>>,
}

pub fn run_evaluate(paths: TunerPaths, apply: bool, at: Option<&str>) -> Result<()> {
    let auth = ApplyAuthorization::from_flag_or_env(apply);
    let now = instant(at)?;
    let report = Evaluator::new(paths).run_at(now, auth)?;

    print_json(&EvaluateOutput {
        proposal_id: report.proposal_id.as_str(),
        proposal_path: report.proposal_path.display().to_string(),
        proposal: &report.proposal,
        skipped_lines: report.skipped.len(),
        changes: report.changes.iter().map(ChangeOutput::from).collect(),
    })
}

pub fn run_log_turn(
    paths: &TunerPaths,
    coherence: f64,
    mirror_residual: f64,
    samples: u32,
    source: &str,
    at: Option<&str>,
) -> Result<()> {
    let record = TelemetryRecord::turn(instant(at)?, coherence, mirror_residual, samples)?;
    let log = paths.telemetry();
    append_turn(log, &record, source)
        .with_context(|| format!("failed to append to telemetry log {}", log.display()))?;
    print_json(&record)
}
