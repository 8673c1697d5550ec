//! ConsensusEngine — runs the three-stage triage protocol over a batch.
//!
//! Cases are processed strictly in order, one oracle call at a time:
//! conservative pass → aggressive pass → arbitration → (tie-breaker).
//! A case is only written once its decision is complete, so a failure at
//! any stage leaves the row exactly as it was and a rerun retries it.

use std::time::{Duration, Instant};

use uuid::Uuid;

use super::arbitration::{arbitrate, Arbitration};
use super::error::TriageError;
use super::pacing::{PauseKind, Pacer};
use super::parser::parse_verdict;
use super::prompt::build_prompt;
use super::types::*;
use crate::oracle::{OracleError, TextGenerationOracle};
use crate::store::CaseStore;

/// Near-deterministic sampling used for every pass.
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Per-case retry policy. One attempt means "retry by rerunning the batch".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Backoff before attempt `attempt + 1`, doubling from `base_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub temperature: f32,
    pub retry: RetryPolicy,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            retry: RetryPolicy::default(),
        }
    }
}

pub type Arbiter = fn(TraumaLevel, TraumaLevel) -> Arbitration;

pub struct ConsensusEngine<'a> {
    oracle: &'a dyn TextGenerationOracle,
    pacer: &'a dyn Pacer,
    config: ConsensusConfig,
    arbiter: Arbiter,
}

impl<'a> ConsensusEngine<'a> {
    pub fn new(
        oracle: &'a dyn TextGenerationOracle,
        pacer: &'a dyn Pacer,
        config: ConsensusConfig,
    ) -> Self {
        Self {
            oracle,
            pacer,
            config,
            arbiter: arbitrate,
        }
    }

    /// Replace the arbitration rule (e.g. for an extended level vocabulary).
    pub fn with_arbiter(mut self, arbiter: Arbiter) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Run one classification pass and parse its verdict.
    pub fn run_stage(&self, stage: Stage, transcript: &str) -> Result<Verdict, TriageError> {
        let messages = build_prompt(stage, transcript);
        tracing::debug!(stage = stage.as_str(), oracle = self.oracle.name(), "Querying oracle");

        let raw = self.oracle.complete(&messages, self.config.temperature)?;
        tracing::debug!(stage = stage.as_str(), response = %raw, "Oracle responded");

        parse_verdict(&raw)
    }

    /// Decide one transcript. Nothing is written here; the caller commits.
    pub fn decide(&self, transcript: &str) -> Result<CaseDecision, TriageError> {
        if transcript.trim().is_empty() {
            return Err(TriageError::EmptyTranscript);
        }

        let conservative = self.run_stage(Stage::Conservative, transcript)?;
        let aggressive = self.run_stage(Stage::Aggressive, transcript)?;

        let (hybrid_level, tiebreak) = match (self.arbiter)(conservative.level, aggressive.level) {
            Arbitration::Decided(level) => (level, None),
            Arbitration::NeedsTiebreak => {
                let verdict = self.run_stage(Stage::Tiebreak, transcript)?;
                self.pacer.pause(PauseKind::AfterTiebreak);
                (verdict.level, Some(verdict))
            }
        };

        Ok(CaseDecision {
            conservative,
            aggressive,
            tiebreak,
            hybrid_level,
            decided_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        })
    }

    /// `decide` under the configured retry policy.
    pub fn decide_with_retry(&self, row: usize, transcript: &str) -> Result<CaseDecision, TriageError> {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.decide(transcript) {
                Ok(decision) => return Ok(decision),
                Err(e) if attempt < max_attempts && e.is_transient() => {
                    let delay = match &e {
                        TriageError::Oracle(OracleError::RateLimited {
                            retry_after_secs: Some(secs),
                        }) => self.config.retry.backoff(attempt).max(Duration::from_secs(*secs)),
                        _ => self.config.retry.backoff(attempt),
                    };
                    tracing::debug!(
                        row,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying case"
                    );
                    self.pacer.pause(PauseKind::RetryBackoff(delay));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Process every case in order, mutating decided rows in place.
    pub fn process_batch(&self, cases: &mut [TriageCase]) -> BatchResult {
        self.process_batch_with(cases, None, None)
    }

    /// Like `process_batch`, additionally checkpointing each committed row to
    /// `store` and reporting progress.
    pub fn process_batch_with(
        &self,
        cases: &mut [TriageCase],
        store: Option<&dyn CaseStore>,
        progress_fn: Option<&dyn Fn(BatchStatusEvent)>,
    ) -> BatchResult {
        let start = Instant::now();
        let total = cases.len();
        let mut result = BatchResult {
            run_id: Uuid::new_v4().to_string(),
            total,
            ..Default::default()
        };

        if let Some(progress) = progress_fn {
            let pending = cases
                .iter()
                .filter(|c| !c.is_decided() && c.usable_transcript().is_some())
                .count();
            progress(BatchStatusEvent::Started { total, pending });
        }

        tracing::info!(run_id = %result.run_id, total, oracle = self.oracle.name(), "Triage batch started");

        for (i, case) in cases.iter_mut().enumerate() {
            let outcome = self.process_case(case, store, &mut result);

            match &outcome {
                CaseOutcome::Decided { level, tiebreak_used } => {
                    tracing::info!(
                        row = case.row,
                        level = level.as_str(),
                        tiebreak = tiebreak_used,
                        "[{}/{}] Decided L{}",
                        i + 1,
                        total,
                        level
                    );
                }
                CaseOutcome::Failed { error } => {
                    tracing::warn!(row = case.row, error = %error, "[{}/{}] Case failed", i + 1, total);
                }
                CaseOutcome::AlreadyDecided | CaseOutcome::EmptyTranscript => {}
            }

            if let Some(progress) = progress_fn {
                progress(BatchStatusEvent::CaseFinished {
                    row: case.row,
                    total,
                    outcome,
                });
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            run_id = %result.run_id,
            decided = result.decided,
            failed = result.failed,
            skipped = result.already_decided + result.skipped_empty,
            duration_ms = result.duration_ms,
            "Triage batch finished"
        );

        if let Some(progress) = progress_fn {
            progress(BatchStatusEvent::Completed {
                decided: result.decided,
                failed: result.failed,
                duration_ms: result.duration_ms,
            });
        }

        result
    }

    fn process_case(
        &self,
        case: &mut TriageCase,
        store: Option<&dyn CaseStore>,
        result: &mut BatchResult,
    ) -> CaseOutcome {
        if case.is_decided() {
            result.already_decided += 1;
            return CaseOutcome::AlreadyDecided;
        }

        let transcript = match case.usable_transcript() {
            Some(t) => t.to_string(),
            None => {
                result.skipped_empty += 1;
                return CaseOutcome::EmptyTranscript;
            }
        };

        let decision = match self.decide_with_retry(case.row, &transcript) {
            Ok(d) => d,
            Err(e) => {
                result.failed += 1;
                result.errors.push(format!("Row {}: {e}", case.row));
                return CaseOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let level = decision.hybrid_level;
        let tiebreak_used = decision.tiebreak.is_some();
        case.commit(decision);

        if let Some(store) = store {
            if let Err(e) = store.save_case(case) {
                // Row stays decided in memory; the final full save retries it.
                tracing::warn!(row = case.row, error = %e, "Checkpoint failed");
                result.errors.push(format!("Row {} checkpoint: {e}", case.row));
            }
        }

        result.decided += 1;
        if tiebreak_used {
            result.tiebreaks += 1;
        }
        match level {
            TraumaLevel::One => result.level_one += 1,
            TraumaLevel::Two => result.level_two += 1,
        }

        self.pacer.pause(PauseKind::AfterCase);

        CaseOutcome::Decided {
            level,
            tiebreak_used,
        }
    }
}
