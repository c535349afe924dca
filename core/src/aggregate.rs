//! Windowed aggregation over turn records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tidegate_types::TelemetryRecord;

/// Signals computed from the records inside one evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Aggregate {
    /// Records that fell inside the window.
    pub records: usize,
    /// Sum of per-record sample counts.
    pub sample_count: u64,
    pub coherence_avg: Option<f64>,
    pub mirror_residual_avg: Option<f64>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    n: u32,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.n += 1;
        }
    }

    fn get(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / f64::from(self.n))
    }
}

impl Aggregate {
    /// Aggregate every record with `timestamp >= since`.
    ///
    /// A record missing one score is left out of that score's mean only.
    pub fn over<'a>(
        records: impl IntoIterator<Item = &'a TelemetryRecord>,
        since: DateTime<Utc>,
    ) -> Self {
        let mut coherence = Mean::default();
        let mut mirror = Mean::default();
        let mut out = Self::default();

        for record in records.into_iter().filter(|r| r.timestamp >= since) {
            out.records += 1;
            out.sample_count += u64::from(record.sample_count);
            coherence.push(record.coherence);
            mirror.push(record.mirror_residual);
        }

        out.coherence_avg = coherence.get();
        out.mirror_residual_avg = mirror.get();
        out
    }
}
