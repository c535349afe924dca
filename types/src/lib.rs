//! Core domain types for tidegate.
//!
//! This crate contains pure domain types with no IO and minimal dependencies.
//! Everything here can be used from any layer of the tuner.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod lever;
mod profile;
mod proposal;
mod telemetry;

pub use lever::{Lever, NudgeCaps, Nudges};
pub use profile::{KeyPath, ThresholdNode, ThresholdProfile};
pub use proposal::{Delta, Proposal, ProposalId, ThresholdKey, Verdict};
pub use telemetry::TelemetryRecord;

use thiserror::Error;

// ============================================================================
// Input validation
// ============================================================================

/// Rejected caller input. Fatal to the call that produced it, never to a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputValidationError {
    #[error("caps must be finite, got [{lo}, {hi}]")]
    NonFiniteCaps { lo: f64, hi: f64 },
    #[error("caps lower bound {lo} exceeds upper bound {hi}")]
    InvertedCaps { lo: f64, hi: f64 },
    #[error("caps must be positive, got [{lo}, {hi}]")]
    NonPositiveCaps { lo: f64, hi: f64 },
    #[error("invalid timestamp {raw:?}: expected ISO-8601 such as 2025-10-19T12:00:00Z")]
    Timestamp { raw: String },
    #[error("key path must be non-empty dot-separated segments, got {raw:?}")]
    KeyPath { raw: String },
    #[error("{field} must be within [0, 1], got {value}")]
    UnitInterval { field: &'static str, value: f64 },
    #[error("sample count must be at least 1")]
    ZeroSamples,
}

/// Parse an ISO-8601 instant.
///
/// Accepts RFC 3339 with a `Z` or numeric offset (converted to UTC) and naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` forms, which are taken to already be UTC.
pub fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, InputValidationError> {
    let trimmed = raw.trim();
    if let Ok(zoned) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Ok(zoned.with_timezone(&chrono::Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(InputValidationError::Timestamp {
        raw: raw.to_string(),
    })
}
