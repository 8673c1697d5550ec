//! Hybrid multi-prompt triage consensus.
//!
//! Turns an EMS field transcript into a binary pediatric trauma activation
//! level by polling the oracle under three framings:
//! ```text
//! A: conservative ─┐
//!                  ├─ arbitration ─→ hybrid level
//! B: aggressive  ──┘        │
//!                           └─ (disagreement without a Level 1 vote) → C: tie-breaker
//! ```
//! Every stage's raw verdict is kept next to the final decision.

pub mod arbitration;
pub mod engine;
pub mod error;
pub mod pacing;
pub mod parser;
pub mod prompt;
pub mod types;

pub use arbitration::{arbitrate, Arbitration};
pub use engine::{ConsensusConfig, ConsensusEngine, RetryPolicy, DEFAULT_TEMPERATURE};
pub use error::TriageError;
pub use pacing::{FixedDelayPacer, Pacer, PauseKind, RecordingPacer};
pub use parser::{parse_verdict, sanitize_oracle_output};
pub use types::*;
