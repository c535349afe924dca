//! Append-only JSONL telemetry log.
//!
//! Each line is a flat JSON object. Turn records carry `timestamp` (or `ts`),
//! optional `coherence`/`mirror_residual` scores and a `samples` (or
//! `sample_count`) weight. Lines with an `event` other than `turn` are side
//! records, such as logged lunar nudges, and are not aggregated.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tidegate_types::{InputValidationError, TelemetryRecord, parse_timestamp};
use tidegate_utils::append_line;

const TURN_EVENT: &str = "turn";

/// Why one telemetry line was skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryLineError {
    #[error("not valid UTF-8")]
    Encoding,
    #[error("invalid JSON: {0}")]
    Json(String),
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error(transparent)]
    Invalid(#[from] InputValidationError),
}

/// A line the reader could not use. `line` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub line: usize,
    pub error: TelemetryLineError,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    #[serde(default, alias = "ts")]
    timestamp: Option<String>,
    #[serde(default)]
    coherence: Option<f64>,
    #[serde(default)]
    mirror_residual: Option<f64>,
    #[serde(default, alias = "sample_count")]
    samples: Option<u32>,
    #[serde(default)]
    event: Option<String>,
}

/// Parsed form of one non-blank line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Turn(TelemetryRecord),
    /// A side record; carries its event name.
    Event(String),
}

pub fn parse_line(line: &str) -> Result<LineOutcome, TelemetryLineError> {
    let raw: RawLine = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(err) => return Err(TelemetryLineError::Json(err.to_string())),
    };

    if let Some(event) = raw.event
        && event != TURN_EVENT
    {
        return Ok(LineOutcome::Event(event));
    }

    let timestamp = raw.timestamp.ok_or(TelemetryLineError::MissingTimestamp)?;
    let timestamp = parse_timestamp(&timestamp)?;
    let coherence = raw
        .coherence
        .map(|value| TelemetryRecord::unit_score("coherence", value))
        .transpose()?;
    let mirror_residual = raw
        .mirror_residual
        .map(|value| TelemetryRecord::unit_score("mirror_residual", value))
        .transpose()?;
    let sample_count = raw.samples.unwrap_or(1);
    if sample_count == 0 {
        return Err(InputValidationError::ZeroSamples.into());
    }

    Ok(LineOutcome::Turn(TelemetryRecord {
        timestamp,
        coherence,
        mirror_residual,
        sample_count,
    }))
}

/// Everything read from one pass over the log, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryLog {
    pub records: Vec<TelemetryRecord>,
    pub skipped: Vec<SkippedLine>,
    pub events: usize,
}

impl TelemetryLog {
    /// Parse a whole log held in memory. Never fails; bad lines are collected.
    #[must_use]
    pub fn parse(bytes: &[u8]) -> Self {
        let mut log = Self::default();
        for (index, raw) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = index + 1;
            let outcome = std::str::from_utf8(raw)
                .map_err(|_| TelemetryLineError::Encoding)
                .and_then(|text| {
                    let text = text.trim();
                    if text.is_empty() {
                        Ok(None)
                    } else {
                        parse_line(text).map(Some)
                    }
                });
            match outcome {
                Ok(None) => {}
                Ok(Some(LineOutcome::Turn(record))) => log.records.push(record),
                Ok(Some(LineOutcome::Event(event))) => {
                    tracing::debug!(line, event = %event, "Ignoring non-turn telemetry record");
                    log.events += 1;
                }
                Err(error) => {
                    tracing::warn!(line, "Skipping corrupt telemetry line: {error}");
                    log.skipped.push(SkippedLine { line, error });
                }
            }
        }
        log
    }
}

/// Failure to open the log at all.
#[derive(Debug, Error)]
pub enum TelemetryReadError {
    #[error("telemetry log not found at {}", path.display())]
    Missing { path: PathBuf },
    #[error("failed to read telemetry log at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl TelemetryReadError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            TelemetryReadError::Missing { path } | TelemetryReadError::Io { path, .. } => path,
        }
    }
}

pub fn read_telemetry(path: &Path) -> Result<TelemetryLog, TelemetryReadError> {
    let bytes = std::fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            TelemetryReadError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            TelemetryReadError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let log = TelemetryLog::parse(&bytes);
    tracing::debug!(
        path = %path.display(),
        records = log.records.len(),
        skipped = log.skipped.len(),
        events = log.events,
        "Read telemetry log"
    );
    Ok(log)
}

#[derive(Serialize)]
struct TurnLine<'a> {
    #[serde(flatten)]
    record: &'a TelemetryRecord,
    source: &'a str,
}

/// Append one turn record, tagged with where it came from.
pub fn append_turn(path: &Path, record: &TelemetryRecord, source: &str) -> io::Result<()> {
    let line = TurnLine { record, source };
    let line = serde_json::to_string(&line).map_err(io::Error::other)?;
    append_line(path, &line)
}

#[derive(Serialize)]
struct EventLine<'a, T: Serialize> {
    timestamp: String,
    event: &'a str,
    #[serde(flatten)]
    payload: &'a T,
}

/// Append a side record. `payload` must serialize as a JSON object.
pub fn append_event<T: Serialize>(
    path: &Path,
    at: DateTime<Utc>,
    event: &str,
    payload: &T,
) -> io::Result<()> {
    let line = EventLine {
        timestamp: at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        event,
        payload,
    };
    let line = serde_json::to_string(&line).map_err(io::Error::other)?;
    append_line(path, &line)
}
