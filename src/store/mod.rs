//! Batch table storage.
//!
//! The engine only needs `CaseStore`: load the batch once, checkpoint each
//! committed row, save everything at the end.

pub mod json;
pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

use crate::triage::TriageCase;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Invalid level in row {row}, column {column}: {value:?}")]
    InvalidLevel {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("Row {row} is partially decided: {reason}")]
    Inconsistent { row: usize, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait CaseStore {
    /// All rows in position order.
    fn load_cases(&self) -> Result<Vec<TriageCase>, StoreError>;

    /// Persist one row (transcript and every result field) atomically.
    fn save_case(&self, case: &TriageCase) -> Result<(), StoreError>;

    /// Persist every row in one transaction.
    fn save_all(&self, cases: &[TriageCase]) -> Result<(), StoreError>;

    /// Append new undecided rows after the current last row.
    fn insert_transcripts(&self, transcripts: &[Option<String>]) -> Result<usize, StoreError>;
}
