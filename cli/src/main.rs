//! tidegate CLI - phase queries, transient nudges and the self-learning evaluator.
//!
//! ```text
//! tidegate phase     [--iso TS] [--caps LO HI]
//! tidegate nudge     [--iso TS] [--caps LO HI] [--profile NAME] [--profile-file PATH]
//! tidegate evaluate  [--apply] [--at TS]
//! tidegate log-turn  COH MIR [--samples N] [--source NAME] [--at TS]
//! ```
//!
//! Structured output goes to stdout as JSON; logs go to stderr, filtered by
//! `RUST_LOG` (default `warn`).

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tidegate_config::{ROOT_ENV, TunerPaths};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "tidegate", version)]
#[command(about = "Lunar nudges and self-learning threshold tuning")]
struct Cli {
    #[command(flatten)]
    paths: PathArgs,
    #[command(subcommand)]
    command: Commands,
}

/// File locations; each defaults to its place under the root.
#[derive(Args)]
struct PathArgs {
    /// Project root
    #[arg(long, global = true, env = ROOT_ENV)]
    root: Option<PathBuf>,
    /// Telemetry log (JSONL)
    #[arg(long, global = true)]
    telemetry: Option<PathBuf>,
    /// Tuning policy (TOML)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,
    /// Lunar nudge settings (TOML)
    #[arg(long, global = true)]
    lunar_config: Option<PathBuf>,
    /// Threshold profile store (TOML)
    #[arg(long, global = true)]
    thresholds: Option<PathBuf>,
    /// Directory receiving proposals
    #[arg(long, global = true)]
    proposals_dir: Option<PathBuf>,
    /// Learning log
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,
}

impl PathArgs {
    fn resolve(self) -> TunerPaths {
        let mut paths = TunerPaths::resolve(self.root);
        if let Some(path) = self.telemetry {
            paths = paths.with_telemetry(path);
        }
        if let Some(path) = self.policy {
            paths = paths.with_policy(path);
        }
        if let Some(path) = self.lunar_config {
            paths = paths.with_lunar(path);
        }
        if let Some(path) = self.thresholds {
            paths = paths.with_profile_store(path);
        }
        if let Some(path) = self.proposals_dir {
            paths = paths.with_proposals_dir(path);
        }
        if let Some(path) = self.audit_log {
            paths = paths.with_audit_log(path);
        }
        paths
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the lunar phase and its lever multipliers
    Phase {
        /// Instant to sample (ISO-8601); defaults to now
        #[arg(long)]
        iso: Option<String>,
        /// Clamp multipliers into [LO, HI]
        #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
        caps: Option<Vec<f64>>,
    },
    /// Print profiles with the current phase nudges applied; nothing is saved
    Nudge {
        #[arg(long)]
        iso: Option<String>,
        /// Override the configured caps
        #[arg(long, num_args = 2, value_names = ["LO", "HI"])]
        caps: Option<Vec<f64>>,
        /// Only this profile from the store
        #[arg(long, conflicts_with = "profile_file")]
        profile: Option<String>,
        /// Nudge a single profile file instead of the store
        #[arg(long)]
        profile_file: Option<PathBuf>,
    },
    /// Evaluate recent telemetry and write a threshold proposal
    Evaluate {
        /// Commit deltas to the profile store (also TIDEGATE_APPLY=1)
        #[arg(long)]
        apply: bool,
        /// Evaluate as of this instant instead of now
        #[arg(long)]
        at: Option<String>,
    },
    /// Append one turn record to the telemetry log
    LogTurn {
        /// Coherence score in [0, 1]
        coherence: f64,
        /// Mirror residual in [0, 1]
        mirror_residual: f64,
        #[arg(long, default_value_t = 1)]
        samples: u32,
        #[arg(long, default_value = "cli")]
        source: String,
        #[arg(long)]
        at: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(env_filter)
        .init();
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let paths = cli.paths.resolve();

    match cli.command {
        Commands::Phase { iso, caps } => commands::run_phase(iso.as_deref(), caps.as_deref()),
        Commands::Nudge {
            iso,
            caps,
            profile,
            profile_file,
        } => commands::run_nudge(
            &paths,
            &commands::NudgeArgs {
                iso: iso.as_deref(),
                caps: caps.as_deref(),
                profile: profile.as_deref(),
                profile_file: profile_file.as_deref(),
            },
        ),
        Commands::Evaluate { apply, at } => commands::run_evaluate(paths, apply, at.as_deref()),
        Commands::LogTurn {
            coherence,
            mirror_residual,
            samples,
            source,
            at,
        } => commands::run_log_turn(
            &paths,
            coherence,
            mirror_residual,
            samples,
            &source,
            at.as_deref(),
        ),
    }
}
