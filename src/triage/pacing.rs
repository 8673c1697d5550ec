//! Request pacing between oracle calls.
//!
//! The engine never sleeps directly; it asks a `Pacer` to pause. Production
//! uses fixed wall-clock delays, tests record the requested pauses instead.

use std::sync::Mutex;
use std::time::Duration;

/// Default pause after a completed case (and after a tie-break call).
pub const DEFAULT_CASE_DELAY: Duration = Duration::from_millis(1200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseKind {
    AfterCase,
    AfterTiebreak,
    RetryBackoff(Duration),
}

pub trait Pacer: Send + Sync {
    fn pause(&self, kind: PauseKind);
}

/// Blocking fixed-delay pacer.
#[derive(Debug, Clone)]
pub struct FixedDelayPacer {
    after_case: Duration,
    after_tiebreak: Duration,
}

impl FixedDelayPacer {
    pub fn new(after_case: Duration, after_tiebreak: Duration) -> Self {
        Self {
            after_case,
            after_tiebreak,
        }
    }

    pub fn delay_for(&self, kind: PauseKind) -> Duration {
        match kind {
            PauseKind::AfterCase => self.after_case,
            PauseKind::AfterTiebreak => self.after_tiebreak,
            PauseKind::RetryBackoff(d) => d,
        }
    }
}

impl Default for FixedDelayPacer {
    fn default() -> Self {
        Self::new(DEFAULT_CASE_DELAY, DEFAULT_CASE_DELAY)
    }
}

impl Pacer for FixedDelayPacer {
    fn pause(&self, kind: PauseKind) {
        let delay = self.delay_for(kind);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Records requested pauses without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<PauseKind>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<PauseKind> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&self, kind: PauseKind) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(kind);
        }
    }
}
