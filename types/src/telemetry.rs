use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::InputValidationError;

/// One observed turn (or a pre-aggregated batch of turns) from the agent.
///
/// Either score may be absent; a record without a score is excluded from
/// that score's average but still counts toward the sample total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    #[serde(serialize_with = "serialize_zulu")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coherence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_residual: Option<f64>,
    #[serde(rename = "samples")]
    pub sample_count: u32,
}

impl TelemetryRecord {
    /// A fully-scored turn record, validated.
    pub fn turn(
        timestamp: DateTime<Utc>,
        coherence: f64,
        mirror_residual: f64,
        sample_count: u32,
    ) -> Result<Self, InputValidationError> {
        check_unit("coherence", coherence)?;
        check_unit("mirror_residual", mirror_residual)?;
        if sample_count == 0 {
            return Err(InputValidationError::ZeroSamples);
        }
        Ok(Self {
            timestamp,
            coherence: Some(coherence),
            mirror_residual: Some(mirror_residual),
            sample_count,
        })
    }

    /// Validate a score read back from the log.
    pub fn unit_score(field: &'static str, value: f64) -> Result<f64, InputValidationError> {
        check_unit(field, value)
    }
}

/// Reject values outside `[0, 1]` (including NaN).
fn check_unit(field: &'static str, value: f64) -> Result<f64, InputValidationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(InputValidationError::UnitInterval { field, value })
    }
}

fn serialize_zulu<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}
