//! Self-learning evaluator: one batch pass from telemetry to proposal.
//!
//! Everything is loaded before anything is written. When apply is
//! authorized the deltas are applied to the in-memory store, the proposal is
//! created once with its final `applied` flag, and only then is the store
//! saved. A failed save removes that proposal again, so a store change never
//! lands without its record. The audit line comes last.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tidegate_config::{ApplyAuthorization, ProfileStore, TunerPaths, TuningPolicy};
use tidegate_types::{Delta, KeyPath, Proposal, ProposalId, ThresholdKey};
use tidegate_utils::atomic_write_new;

use crate::aggregate::Aggregate;
use crate::audit::AuditEntry;
use crate::decision::{DailyUsage, Decision, decide, derive_deltas, round_to};
use crate::errors::EvaluatorError;
use crate::telemetry::{SkippedLine, read_telemetry};

/// Decimal places kept for applied threshold values.
const APPLIED_PRECISION: i32 = 4;

/// Run stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Aggregating,
    Deciding,
    Recording,
    Applying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Loading => "loading",
            Stage::Aggregating => "aggregating",
            Stage::Deciding => "deciding",
            Stage::Recording => "recording",
            Stage::Applying => "applying",
        })
    }
}

/// One value rewritten in the profile store.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub profile: String,
    pub key: ThresholdKey,
    /// Where the value was found inside the profile.
    pub path: KeyPath,
    pub old: f64,
    pub new: f64,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub proposal_id: ProposalId,
    pub proposal_path: PathBuf,
    pub proposal: Proposal,
    pub decision: Decision,
    pub aggregate: Aggregate,
    pub skipped: Vec<SkippedLine>,
    pub changes: Vec<AppliedChange>,
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    paths: TunerPaths,
}

impl Evaluator {
    #[must_use]
    pub fn new(paths: TunerPaths) -> Self {
        Self { paths }
    }

    #[must_use]
    pub fn paths(&self) -> &TunerPaths {
        &self.paths
    }

    pub fn run(&self, auth: ApplyAuthorization) -> Result<RunReport, EvaluatorError> {
        self.run_at(Utc::now(), auth)
    }

    /// Evaluate the window ending at `now`.
    pub fn run_at(
        &self,
        now: DateTime<Utc>,
        auth: ApplyAuthorization,
    ) -> Result<RunReport, EvaluatorError> {
        let paths = &self.paths;

        enter(Stage::Loading);
        let policy = TuningPolicy::load(paths.policy())?;
        let telemetry = read_telemetry(paths.telemetry())?;
        let mut store = if auth.is_granted() {
            Some(ProfileStore::load(paths.profile_store())?)
        } else {
            None
        };
        let proposals_dir = paths.proposals_dir();
        fs::create_dir_all(proposals_dir)
            .map_err(|err| EvaluatorError::io("create proposal directory", proposals_dir, err))?;
        let used = daily_usage(proposals_dir, now)?;

        enter(Stage::Aggregating);
        let since = window_start(now, policy.window().hours());
        let aggregate = Aggregate::over(&telemetry.records, since);
        tracing::debug!(
            records = aggregate.records,
            samples = aggregate.sample_count,
            skipped = telemetry.skipped.len(),
            "Aggregated telemetry window"
        );

        enter(Stage::Deciding);
        let decision = decide(&aggregate, &policy);
        tracing::debug!(verdict = %decision.verdict, basis = ?decision.basis, "Decided");

        enter(Stage::Recording);
        let deltas = derive_deltas(decision.verdict, &policy, &used);

        let mut changes = Vec::new();
        if let Some(store) = store.as_mut()
            && !deltas.is_empty()
        {
            enter(Stage::Applying);
            changes = apply_deltas(store, &deltas);
            if changes.is_empty() {
                tracing::info!("No profile held a matching numeric threshold; store untouched");
            }
        }

        let proposal = Proposal {
            created_at: now,
            window_hours: policy.window().hours(),
            sample_count: aggregate.sample_count,
            coherence_avg: aggregate.coherence_avg,
            mirror_residual_avg: aggregate.mirror_residual_avg,
            verdict: decision.verdict,
            applied: !changes.is_empty(),
            deltas,
        };
        let (proposal_id, proposal_path) = write_proposal(proposals_dir, &proposal)?;
        if let Some(store) = store.as_ref()
            && proposal.applied
        {
            commit_store(store, &proposal_path)?;
        }

        let entry = AuditEntry {
            at: now,
            verdict: proposal.verdict,
            sample_count: proposal.sample_count,
            coherence_avg: proposal.coherence_avg,
            mirror_residual_avg: proposal.mirror_residual_avg,
            proposals: proposal.deltas.len(),
            proposal: proposal_id.clone(),
            applied: proposal.applied,
        };
        entry
            .append_to(paths.audit_log())
            .map_err(|err| EvaluatorError::io("append audit log", paths.audit_log(), err))?;

        tracing::info!(
            verdict = %proposal.verdict,
            samples = proposal.sample_count,
            window_hours = proposal.window_hours,
            proposal = %proposal_id,
            applied = proposal.applied,
            "Evaluation complete"
        );

        Ok(RunReport {
            proposal_id,
            proposal_path,
            proposal,
            decision,
            aggregate,
            skipped: telemetry.skipped,
            changes,
        })
    }
}

fn enter(stage: Stage) {
    tracing::debug!(%stage, "Evaluator stage");
}

/// Start of the window ending at `now`; saturates at the earliest
/// representable instant instead of overflowing.
fn window_start(now: DateTime<Utc>, hours: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::hours(i64::from(hours)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Sum of `|delta|` per key over applied proposals created on `now`'s UTC day.
///
/// Only files whose name carries today's date are opened. Unreadable or
/// foreign files in the directory are ignored.
pub fn daily_usage(dir: &Path, now: DateTime<Utc>) -> Result<DailyUsage, EvaluatorError> {
    let mut used = DailyUsage::new();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(used),
        Err(err) => return Err(EvaluatorError::io("list proposal directory", dir, err)),
    };
    let today = now.date_naive();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if ProposalId::from_file_name(name).and_then(|id| id.date()) != Some(today) {
            continue;
        }
        let path = entry.path();
        let proposal = match read_proposal(&path) {
            Ok(proposal) => proposal,
            Err(err) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable proposal: {err}");
                continue;
            }
        };
        if !proposal.applied || proposal.created_at.date_naive() != today {
            continue;
        }
        for Delta { key, delta } in proposal.deltas {
            *used.entry(key).or_insert(0.0) += delta.abs();
        }
    }

    Ok(used)
}

fn read_proposal(path: &Path) -> Result<Proposal, Box<dyn std::error::Error>> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Where `key` lives in `profile`: the nested path, else a top-level leaf.
fn locate(store: &ProfileStore, profile: &str, key: ThresholdKey) -> Option<(KeyPath, f64)> {
    let nested = key.path();
    if let Some(value) = store.number(profile, &nested) {
        return Some((nested, value));
    }
    let flat = KeyPath::parse(key.leaf()).ok()?;
    store.number(profile, &flat).map(|value| (flat, value))
}

/// Add each delta to every profile that holds the key, clamped to the key's
/// admissible range and rounded.
pub fn apply_deltas(store: &mut ProfileStore, deltas: &[Delta]) -> Vec<AppliedChange> {
    let mut changes = Vec::new();
    for profile in store.profile_names() {
        for delta in deltas {
            let Some((path, old)) = locate(store, &profile, delta.key) else {
                tracing::debug!(profile = %profile, key = %delta.key, "Key absent; skipped");
                continue;
            };
            let (floor, ceiling) = delta.key.admissible_range();
            let new = round_to((old + delta.delta).clamp(floor, ceiling), APPLIED_PRECISION);
            if new == old || !store.set_number(&profile, &path, new) {
                continue;
            }
            tracing::info!(profile = %profile, key = %path, old, new, "Applied threshold delta");
            changes.push(AppliedChange {
                profile: profile.clone(),
                key: delta.key,
                path,
                old,
                new,
            });
        }
    }
    changes
}

/// Save the applied store; on failure withdraw the proposal that claims it.
fn commit_store(store: &ProfileStore, proposal_path: &Path) -> Result<(), EvaluatorError> {
    let Err(err) = store.save() else {
        return Ok(());
    };
    match fs::remove_file(proposal_path) {
        Ok(()) => tracing::warn!(
            path = %proposal_path.display(),
            "Withdrew proposal after the profile store could not be saved"
        ),
        Err(remove_err) => tracing::error!(
            path = %proposal_path.display(),
            "Proposal marked applied but the store was not saved; remove it by hand: {remove_err}"
        ),
    }
    Err(err.into())
}

/// Create the proposal under the first free name for its timestamp.
fn write_proposal(
    dir: &Path,
    proposal: &Proposal,
) -> Result<(ProposalId, PathBuf), EvaluatorError> {
    let mut bytes = serde_json::to_vec_pretty(proposal)?;
    bytes.push(b'\n');

    for attempt in 0..=ProposalId::MAX_ATTEMPT {
        let id = ProposalId::for_instant(proposal.created_at, attempt);
        let path = dir.join(id.file_name());
        match atomic_write_new(&path, &bytes) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Wrote proposal");
                return Ok((id, path));
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => return Err(EvaluatorError::io("write proposal", &path, err)),
        }
    }

    Err(EvaluatorError::NamesExhausted {
        stamp: ProposalId::for_instant(proposal.created_at, 0).to_string(),
        dir: dir.to_path_buf(),
    })
}
