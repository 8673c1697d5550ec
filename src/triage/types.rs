use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════
// Levels & verdicts
// ═══════════════════════════════════════════════════════════

/// Binary pediatric trauma activation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraumaLevel {
    /// Level 1: highest-acuity activation.
    #[serde(rename = "1")]
    One,
    /// Level 2: standard activation.
    #[serde(rename = "2")]
    Two,
}

impl TraumaLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::One => "1",
            Self::Two => "2",
        }
    }
}

impl fmt::Display for TraumaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected \"1\" or \"2\", got {0:?}")]
pub struct InvalidLevel(pub String);

impl FromStr for TraumaLevel {
    type Err = InvalidLevel;

    /// Exact match only: "1" or "2".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Self::One),
            "2" => Ok(Self::Two),
            other => Err(InvalidLevel(other.to_string())),
        }
    }
}

/// One stage's answer: a level plus the one-line structured page
/// (age, vitals, GCS, mechanism of injury, ETA).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub level: TraumaLevel,
    pub summary: String,
}

impl Verdict {
    pub fn new(level: TraumaLevel, summary: impl Into<String>) -> Self {
        Self {
            level,
            summary: summary.into(),
        }
    }
}

/// Classification pass that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Conservative,
    Aggressive,
    Tiebreak,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
            Self::Tiebreak => "tiebreak",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════
// Cases
// ═══════════════════════════════════════════════════════════

/// One row of the batch table. Identified by its position only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageCase {
    pub row: usize,
    pub transcript: Option<String>,
    pub hybrid_level: Option<TraumaLevel>,
    pub conservative: Option<Verdict>,
    pub aggressive: Option<Verdict>,
    pub tiebreak: Option<Verdict>,
    /// RFC 3339 UTC time the decision was committed.
    pub decided_at: Option<String>,
}

impl TriageCase {
    pub fn new(row: usize, transcript: impl Into<String>) -> Self {
        Self {
            row,
            transcript: Some(transcript.into()),
            ..Default::default()
        }
    }

    pub fn is_decided(&self) -> bool {
        self.hybrid_level.is_some()
    }

    /// Transcript text if present and not blank.
    pub fn usable_transcript(&self) -> Option<&str> {
        self.transcript
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Write every result field in one assignment.
    pub fn commit(&mut self, decision: CaseDecision) {
        self.conservative = Some(decision.conservative);
        self.aggressive = Some(decision.aggressive);
        self.tiebreak = decision.tiebreak;
        self.hybrid_level = Some(decision.hybrid_level);
        self.decided_at = Some(decision.decided_at);
    }
}

/// Fully arbitrated result for one case, built before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseDecision {
    pub conservative: Verdict,
    pub aggressive: Verdict,
    pub tiebreak: Option<Verdict>,
    pub hybrid_level: TraumaLevel,
    pub decided_at: String,
}

// ═══════════════════════════════════════════════════════════
// Batch reporting
// ═══════════════════════════════════════════════════════════

/// Per-row outcome reported while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaseOutcome {
    AlreadyDecided,
    EmptyTranscript,
    Decided { level: TraumaLevel, tiebreak_used: bool },
    Failed { error: String },
}

/// Progress events emitted during `process_batch_with`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchStatusEvent {
    Started { total: usize, pending: usize },
    CaseFinished { row: usize, total: usize, outcome: CaseOutcome },
    Completed { decided: usize, failed: usize, duration_ms: u64 },
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub run_id: String,
    pub total: usize,
    pub decided: usize,
    pub already_decided: usize,
    pub skipped_empty: usize,
    pub failed: usize,
    pub tiebreaks: usize,
    pub level_one: usize,
    pub level_two: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}
