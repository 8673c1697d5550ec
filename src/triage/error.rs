//! Error types for the consensus pipeline.
//!
//! A `TriageError` abandons exactly one case; the batch loop reports it
//! and moves on.

use thiserror::Error;

use crate::oracle::OracleError;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Unparseable oracle output: {0}")]
    Parse(String),

    #[error("Transcript is empty")]
    EmptyTranscript,
}

impl TriageError {
    /// Whether retrying the same case could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Oracle(OracleError::Auth(_)) => false,
            Self::Oracle(_) | Self::Parse(_) => true,
            Self::EmptyTranscript => false,
        }
    }
}
