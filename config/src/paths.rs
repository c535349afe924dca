//! Resolved file locations and the apply toggle.

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the project root.
pub const ROOT_ENV: &str = "TIDEGATE_ROOT";
/// Environment variable granting apply authorization.
pub const APPLY_ENV: &str = "TIDEGATE_APPLY";

/// Every file the tuner touches, resolved once.
///
/// ```text
/// <root>/
///   thresholds.toml              profile store
///   runtime/self_learning.toml   tuning policy
///   runtime/lunar_nudge.toml     lunar settings (optional)
///   thread/telemetry.jsonl       telemetry log
///   thread/patches/              proposals
///   thread/learning_log.md       audit log
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunerPaths {
    root: PathBuf,
    telemetry: PathBuf,
    policy: PathBuf,
    lunar: PathBuf,
    profile_store: PathBuf,
    proposals_dir: PathBuf,
    audit_log: PathBuf,
}

impl TunerPaths {
    #[must_use]
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let thread = root.join("thread");
        let runtime = root.join("runtime");
        Self {
            telemetry: thread.join("telemetry.jsonl"),
            policy: runtime.join("self_learning.toml"),
            lunar: runtime.join("lunar_nudge.toml"),
            profile_store: root.join("thresholds.toml"),
            proposals_dir: thread.join("patches"),
            audit_log: thread.join("learning_log.md"),
            root,
        }
    }

    /// Root from the explicit argument, else `TIDEGATE_ROOT`, else the current directory.
    #[must_use]
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let root = explicit
            .or_else(|| env::var_os(ROOT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_root(root)
    }

    #[must_use]
    pub fn with_telemetry(mut self, path: impl Into<PathBuf>) -> Self {
        self.telemetry = path.into();
        self
    }

    #[must_use]
    pub fn with_policy(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy = path.into();
        self
    }

    #[must_use]
    pub fn with_lunar(mut self, path: impl Into<PathBuf>) -> Self {
        self.lunar = path.into();
        self
    }

    #[must_use]
    pub fn with_profile_store(mut self, path: impl Into<PathBuf>) -> Self {
        self.profile_store = path.into();
        self
    }

    #[must_use]
    pub fn with_proposals_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.proposals_dir = path.into();
        self
    }

    #[must_use]
    pub fn with_audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log = path.into();
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn telemetry(&self) -> &Path {
        &self.telemetry
    }

    #[must_use]
    pub fn policy(&self) -> &Path {
        &self.policy
    }

    #[must_use]
    pub fn lunar(&self) -> &Path {
        &self.lunar
    }

    #[must_use]
    pub fn profile_store(&self) -> &Path {
        &self.profile_store
    }

    #[must_use]
    pub fn proposals_dir(&self) -> &Path {
        &self.proposals_dir
    }

    #[must_use]
    pub fn audit_log(&self) -> &Path {
        &self.audit_log
    }
}

/// Whether a run may commit its deltas to the live profile store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyAuthorization {
    #[default]
    ProposeOnly,
    Apply,
}

impl ApplyAuthorization {
    /// Read `TIDEGATE_APPLY`; anything but `1|true|yes|on` means propose-only.
    #[must_use]
    pub fn from_env() -> Self {
        env::var(APPLY_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    /// An explicit flag wins; otherwise fall back to the environment.
    #[must_use]
    pub fn from_flag_or_env(flag: bool) -> Self {
        if flag { Self::Apply } else { Self::from_env() }
    }

    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Self::Apply,
            _ => Self::ProposeOnly,
        }
    }

    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Apply)
    }
}
