//! Core tuning logic for tidegate.
//!
//! Two independent stages act on threshold profiles:
//!
//! - [`phase`] and [`nudge`]: a transient, multiplicative lunar bias that is
//!   recomputed on every call and never stored.
//! - [`Evaluator`]: an additive, persistent controller that turns recent
//!   telemetry into bounded deltas, records a proposal, and optionally
//!   commits it to the profile store.
//!
//! Each stage returns new values; callers choose the order in which to
//! compose them.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod aggregate;
mod audit;
mod decision;
mod errors;
mod evaluator;
pub mod nudge;
pub mod phase;
pub mod predicate;
pub mod telemetry;

pub use aggregate::Aggregate;
pub use audit::AuditEntry;
pub use decision::{DailyUsage, Decision, DecisionBasis, Signal, decide, derive_deltas};
pub use errors::EvaluatorError;
pub use evaluator::{AppliedChange, Evaluator, RunReport, Stage, apply_deltas, daily_usage};
pub use nudge::NudgedField;
pub use phase::{Phase, PhaseSnapshot};
pub use predicate::{Bindings, Predicate, PredicateError};
pub use telemetry::{
    LineOutcome, SkippedLine, TelemetryLineError, TelemetryLog, TelemetryReadError, read_telemetry,
};
