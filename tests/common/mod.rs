//! Shared test utilities and fixtures
//!
//! A [`Fixture`] is a throwaway project root laid out the way the CLI
//! expects, with helpers to seed policy, telemetry and profiles.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use tempfile::TempDir;
use tidegate_config::TunerPaths;
use tidegate_types::Proposal;

pub const POLICY: &str = r#"[schedule]
window = "24h"

[metrics]
min_samples = 20

[signals]
reward = "coh>=0.88 and mir<=0.35"
penalty = "coh<0.55 or mir>0.50"

[safety.max_delta_per_day]
"gates.triggers.call_harmonizers_below" = 0.04
"gates.triggers.early_severance_below" = 0.02
"#;

pub const STORE: &str = r#"# live thresholds
[profiles.default.gates.triggers]
call_harmonizers_below = 0.62 # tuned by hand
early_severance_below = 0.25

[profiles.default.meta_gate.coherence]
warn_below = 0.60
sever_below = 0.40
stabilize_above = 0.80

[profiles.legacy]
call_harmonizers_below = 0.79
early_severance_below = 0.35
"#;

/// Instant every evaluation in the suite runs at.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 19, 12, 0, 0).unwrap()
}

pub fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct Fixture {
    dir: TempDir,
    pub paths: TunerPaths,
}

impl Fixture {
    /// Empty root: nothing seeded.
    pub fn empty() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = TunerPaths::from_root(dir.path());
        Self { dir, paths }
    }

    /// Root with the standard policy and profile store and an empty telemetry log.
    pub fn new() -> Self {
        let fixture = Self::empty();
        fixture.write_policy(POLICY);
        fixture.write_store(STORE);
        fixture.write_telemetry("");
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, content).expect("write fixture");
    }

    pub fn write_policy(&self, content: &str) {
        Self::write(self.paths.policy(), content);
    }

    pub fn write_store(&self, content: &str) {
        Self::write(self.paths.profile_store(), content);
    }

    pub fn write_lunar(&self, content: &str) {
        Self::write(self.paths.lunar(), content);
    }

    pub fn write_telemetry(&self, content: &str) {
        Self::write(self.paths.telemetry(), content);
    }

    /// Append raw lines to the telemetry log.
    pub fn append_telemetry(&self, lines: &str) {
        let mut content = fs::read_to_string(self.paths.telemetry()).unwrap_or_default();
        content.push_str(lines);
        Self::write(self.paths.telemetry(), &content);
    }

    /// Append `count` single-sample turns, one minute apart, ending `hours_ago` before [`now`].
    pub fn add_turns(&self, count: usize, coh: f64, mir: f64, hours_ago: i64) {
        self.append_telemetry(&turn_lines(count, coh, mir, hours_ago));
    }

    pub fn store_text(&self) -> String {
        fs::read_to_string(self.paths.profile_store()).expect("read store")
    }

    pub fn audit_lines(&self) -> Vec<String> {
        fs::read_to_string(self.paths.audit_log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Proposal files, sorted by name.
    pub fn proposal_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.paths.proposals_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries.map(|e| e.expect("dir entry").path()).collect();
        files.sort();
        files
    }

    pub fn read_proposal(path: &Path) -> Proposal {
        serde_json::from_slice(&fs::read(path).expect("read proposal")).expect("parse proposal")
    }

    /// The `tidegate` binary, rooted at this fixture with a clean environment.
    pub fn tidegate(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_tidegate"));
        cmd.arg("--root")
            .arg(self.root())
            .env_remove("TIDEGATE_ROOT")
            .env_remove("TIDEGATE_APPLY")
            .env_remove("RUST_LOG");
        cmd
    }
}

pub fn turn_lines(count: usize, coh: f64, mir: f64, hours_ago: i64) -> String {
    let end = now() - Duration::hours(hours_ago);
    let mut out = String::new();
    for i in 0..count {
        let ts = end - Duration::minutes(i as i64);
        writeln!(
            out,
            r#"{{"timestamp":"{}","coherence":{coh},"mirror_residual":{mir},"samples":1}}"#,
            iso(ts)
        )
        .unwrap();
    }
    out
}

pub fn stdout_json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
