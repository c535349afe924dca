//! Human-readable learning log, one line per evaluator run.

use std::fmt;
use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tidegate_types::{ProposalId, Verdict};
use tidegate_utils::append_line;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub verdict: Verdict,
    pub sample_count: u64,
    pub coherence_avg: Option<f64>,
    pub mirror_residual_avg: Option<f64>,
    pub proposals: usize,
    pub proposal: ProposalId,
    pub applied: bool,
}

struct Score(Option<f64>);

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value:.3}"),
            None => f.write_str("n/a"),
        }
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "- {} verdict={} samples={} coh={} mir={} proposals={} patch={} applied={}",
            self.at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.verdict,
            self.sample_count,
            Score(self.coherence_avg),
            Score(self.mirror_residual_avg),
            self.proposals,
            self.proposal.file_name(),
            self.applied,
        )
    }
}

impl AuditEntry {
    pub fn append_to(&self, path: &Path) -> io::Result<()> {
        append_line(path, &self.to_string())
    }
}
