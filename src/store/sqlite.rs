use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::{CaseStore, StoreError};
use crate::triage::{BatchResult, TraumaLevel, TriageCase, Verdict};

/// SQLite-backed batch table.
pub struct SqliteCaseStore {
    conn: Connection,
}

impl SqliteCaseStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Row counts for reporting.
    pub fn status(&self) -> Result<StoreStatus, StoreError> {
        let status = self.conn.query_row(
            "SELECT COUNT(*),
                    COUNT(hybrid_level),
                    COUNT(*) FILTER (WHERE hybrid_level IS NULL
                                     AND (transcript IS NULL OR TRIM(transcript) = '')),
                    COUNT(*) FILTER (WHERE hybrid_level = '1'),
                    COUNT(*) FILTER (WHERE hybrid_level = '2'),
                    COUNT(tiebreak_level)
             FROM triage_cases",
            [],
            |row| {
                let total: i64 = row.get(0)?;
                let decided: i64 = row.get(1)?;
                let empty: i64 = row.get(2)?;
                Ok(StoreStatus {
                    total: total as usize,
                    decided: decided as usize,
                    pending: (total - decided - empty) as usize,
                    empty: empty as usize,
                    level_one: row.get::<_, i64>(3)? as usize,
                    level_two: row.get::<_, i64>(4)? as usize,
                    tiebreaks: row.get::<_, i64>(5)? as usize,
                })
            },
        )?;
        Ok(status)
    }

    /// Append a run summary to the audit log.
    pub fn record_run(&self, result: &BatchResult, oracle: &str, started_at: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO batch_runs
             (run_id, oracle, started_at, total, decided, failed, tiebreaks, duration_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                result.run_id,
                oracle,
                started_at,
                result.total as i64,
                result.decided as i64,
                result.failed as i64,
                result.tiebreaks as i64,
                result.duration_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn run_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM batch_runs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn get_case(&self, row_index: usize) -> Result<Option<TriageCase>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_CASES} WHERE row_index = ?1"),
                params![row_index as i64],
                read_row,
            )
            .optional()?;
        row.map(case_from_row).transpose()
    }

    fn upsert(conn: &Connection, case: &TriageCase) -> Result<(), StoreError> {
        let (conservative_level, conservative_summary) = verdict_columns(&case.conservative);
        let (aggressive_level, aggressive_summary) = verdict_columns(&case.aggressive);
        let (tiebreak_level, tiebreak_summary) = verdict_columns(&case.tiebreak);

        conn.execute(
            "INSERT INTO triage_cases
             (row_index, transcript, hybrid_level, conservative_level, conservative_summary,
              aggressive_level, aggressive_summary, tiebreak_level, tiebreak_summary, decided_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(row_index) DO UPDATE SET
                transcript = excluded.transcript,
                hybrid_level = excluded.hybrid_level,
                conservative_level = excluded.conservative_level,
                conservative_summary = excluded.conservative_summary,
                aggressive_level = excluded.aggressive_level,
                aggressive_summary = excluded.aggressive_summary,
                tiebreak_level = excluded.tiebreak_level,
                tiebreak_summary = excluded.tiebreak_summary,
                decided_at = excluded.decided_at",
            params![
                case.row as i64,
                case.transcript,
                case.hybrid_level.map(|l| l.as_str()),
                conservative_level,
                conservative_summary,
                aggressive_level,
                aggressive_summary,
                tiebreak_level,
                tiebreak_summary,
                case.decided_at,
            ],
        )?;
        Ok(())
    }
}

impl CaseStore for SqliteCaseStore {
    fn load_cases(&self) -> Result<Vec<TriageCase>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_CASES} ORDER BY row_index ASC"))?;
        let rows = stmt.query_map([], read_row)?;

        let mut cases = Vec::new();
        for row in rows {
            cases.push(case_from_row(row?)?);
        }
        Ok(cases)
    }

    fn save_case(&self, case: &TriageCase) -> Result<(), StoreError> {
        Self::upsert(&self.conn, case)
    }

    fn save_all(&self, cases: &[TriageCase]) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        for case in cases {
            Self::upsert(&tx, case)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_transcripts(&self, transcripts: &[Option<String>]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(row_index) + 1, 0) FROM triage_cases",
            [],
            |row| row.get(0),
        )?;

        for (offset, transcript) in transcripts.iter().enumerate() {
            tx.execute(
                "INSERT INTO triage_cases (row_index, transcript) VALUES (?1, ?2)",
                params![next + offset as i64, transcript],
            )?;
        }
        tx.commit()?;

        tracing::debug!(count = transcripts.len(), first_row = next, "Inserted transcripts");
        Ok(transcripts.len())
    }
}

/// Counts over the batch table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub total: usize,
    pub decided: usize,
    pub pending: usize,
    pub empty: usize,
    pub level_one: usize,
    pub level_two: usize,
    pub tiebreaks: usize,
}

// ═══════════════════════════════════════════════════════════
// Row mapping
// ═══════════════════════════════════════════════════════════

const SELECT_CASES: &str = "SELECT row_index, transcript, hybrid_level,
        conservative_level, conservative_summary,
        aggressive_level, aggressive_summary,
        tiebreak_level, tiebreak_summary, decided_at
 FROM triage_cases";

struct CaseRow {
    row_index: i64,
    transcript: Option<String>,
    hybrid_level: Option<String>,
    conservative_level: Option<String>,
    conservative_summary: Option<String>,
    aggressive_level: Option<String>,
    aggressive_summary: Option<String>,
    tiebreak_level: Option<String>,
    tiebreak_summary: Option<String>,
    decided_at: Option<String>,
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CaseRow> {
    Ok(CaseRow {
        row_index: row.get(0)?,
        transcript: row.get(1)?,
        hybrid_level: row.get(2)?,
        conservative_level: row.get(3)?,
        conservative_summary: row.get(4)?,
        aggressive_level: row.get(5)?,
        aggressive_summary: row.get(6)?,
        tiebreak_level: row.get(7)?,
        tiebreak_summary: row.get(8)?,
        decided_at: row.get(9)?,
    })
}

fn parse_level(
    row: usize,
    column: &'static str,
    value: Option<String>,
) -> Result<Option<TraumaLevel>, StoreError> {
    value
        .map(|v| {
            v.parse::<TraumaLevel>()
                .map_err(|_| StoreError::InvalidLevel { row, column, value: v })
        })
        .transpose()
}

fn verdict_from_columns(
    row: usize,
    column: &'static str,
    level: Option<String>,
    summary: Option<String>,
) -> Result<Option<Verdict>, StoreError> {
    Ok(parse_level(row, column, level)?
        .map(|level| Verdict::new(level, summary.unwrap_or_default())))
}

fn verdict_columns(verdict: &Option<Verdict>) -> (Option<&'static str>, Option<&str>) {
    match verdict {
        Some(v) => (Some(v.level.as_str()), Some(v.summary.as_str())),
        None => (None, None),
    }
}

fn case_from_row(r: CaseRow) -> Result<TriageCase, StoreError> {
    let row = r.row_index as usize;
    let hybrid_level = parse_level(row, "hybrid_level", r.hybrid_level)?;
    let conservative = verdict_from_columns(row, "conservative_level", r.conservative_level, r.conservative_summary)?;
    let aggressive = verdict_from_columns(row, "aggressive_level", r.aggressive_level, r.aggressive_summary)?;
    let tiebreak = verdict_from_columns(row, "tiebreak_level", r.tiebreak_level, r.tiebreak_summary)?;

    let both_verdicts = conservative.is_some() && aggressive.is_some();
    if hybrid_level.is_some() != both_verdicts {
        return Err(StoreError::Inconsistent {
            row,
            reason: "hybrid level and stage verdicts must be set together".into(),
        });
    }

    if let Some(tie) = &tiebreak {
        if hybrid_level != Some(tie.level) {
            return Err(StoreError::Inconsistent {
                row,
                reason: "tie-break verdict must match the hybrid level".into(),
            });
        }
        let level_one_vote = [&conservative, &aggressive]
            .into_iter()
            .flatten()
            .any(|v| v.level == TraumaLevel::One);
        if level_one_vote {
            return Err(StoreError::Inconsistent {
                row,
                reason: "tie-break recorded despite a level 1 stage verdict".into(),
            });
        }
    }

    Ok(TriageCase {
        row,
        transcript: r.transcript,
        hybrid_level,
        conservative,
        aggressive,
        tiebreak,
        decided_at: r.decided_at,
    })
}

// ═══════════════════════════════════════════════════════════
// Migrations
// ═══════════════════════════════════════════════════════════

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current_version = get_current_version(conn);

    let migrations: [(i64, &str); 2] = [
        (1, include_str!("../../resources/migrations/001_triage_cases.sql")),
        (2, include_str!("../../resources/migrations/002_batch_runs.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| StoreError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Current schema version (0 if no schema exists yet).
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, i64>(0)
    })
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decided_case(row: usize, level: TraumaLevel) -> TriageCase {
        TriageCase {
            row,
            transcript: Some("GCS 15".into()),
            hybrid_level: Some(level),
            conservative: Some(Verdict::new(level, "L, 10 y/o")),
            aggressive: Some(Verdict::new(level, "L, 10 y/o")),
            tiebreak: None,
            decided_at: Some("2026-01-01T00:00:00Z".into()),
        }
    }

    #[test]
    fn schema_version_is_current() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        let version: i64 = store
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn migration_idempotent() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        assert!(run_migrations(&store.conn).is_ok());
    }

    #[test]
    fn inserted_transcripts_load_in_order() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .insert_transcripts(&[Some("a".into()), None, Some("c".into())])
            .unwrap();
        store.insert_transcripts(&[Some("d".into())]).unwrap();

        let cases = store.load_cases().unwrap();
        assert_eq!(cases.len(), 4);
        assert_eq!(cases.iter().map(|c| c.row).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(cases[1].transcript, None);
        assert_eq!(cases[3].transcript.as_deref(), Some("d"));
        assert!(cases.iter().all(|c| !c.is_decided()));
    }

    #[test]
    fn save_case_roundtrips_audit_trail() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store.insert_transcripts(&[Some("GCS 15".into())]).unwrap();

        let mut case = decided_case(0, TraumaLevel::Two);
        case.tiebreak = Some(Verdict::new(TraumaLevel::Two, "tie"));
        store.save_case(&case).unwrap();

        assert_eq!(store.get_case(0).unwrap(), Some(case));
        assert_eq!(store.get_case(9).unwrap(), None);
    }

    #[test]
    fn save_all_upserts_every_row() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        let cases = vec![decided_case(0, TraumaLevel::One), TriageCase::new(1, "HR 140")];
        store.save_all(&cases).unwrap();
        assert_eq!(store.load_cases().unwrap(), cases);
    }

    #[test]
    fn invalid_stored_level_is_rejected() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO triage_cases
                 (row_index, transcript, hybrid_level, conservative_level, aggressive_level)
                 VALUES (0, 'x', 'Level 1', '1', '1')",
                [],
            )
            .unwrap();

        let err = store.load_cases().unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidLevel { row: 0, column: "hybrid_level", .. }
        ));
    }

    #[test]
    fn partially_decided_row_is_rejected() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO triage_cases (row_index, transcript, hybrid_level, conservative_level)
                 VALUES (0, 'x', '1', '1')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.load_cases().unwrap_err(),
            StoreError::Inconsistent { row: 0, .. }
        ));
    }

    #[test]
    fn orphan_tiebreak_is_rejected() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO triage_cases (row_index, transcript, tiebreak_level, tiebreak_summary)
                 VALUES (0, 'x', '1', 'orphan')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.load_cases().unwrap_err(),
            StoreError::Inconsistent { row: 0, .. }
        ));
    }

    #[test]
    fn tiebreak_after_level_one_vote_is_rejected() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO triage_cases
                 (row_index, transcript, hybrid_level, conservative_level, aggressive_level, tiebreak_level)
                 VALUES (1, 'x', '1', '1', '2', '1')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.load_cases().unwrap_err(),
            StoreError::Inconsistent { row: 1, .. }
        ));
    }

    #[test]
    fn tiebreak_must_match_hybrid_level() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO triage_cases
                 (row_index, transcript, hybrid_level, conservative_level, aggressive_level, tiebreak_level)
                 VALUES (0, 'x', '2', '2', '2', '1')",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.load_cases().unwrap_err(),
            StoreError::Inconsistent { row: 0, .. }
        ));
    }

    #[test]
    fn status_counts_rows() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        store
            .insert_transcripts(&[Some("a".into()), Some(" ".into()), None, Some("d".into())])
            .unwrap();
        store.save_case(&decided_case(0, TraumaLevel::One)).unwrap();

        let status = store.status().unwrap();
        assert_eq!(status.total, 4);
        assert_eq!(status.decided, 1);
        assert_eq!(status.empty, 2);
        assert_eq!(status.pending, 1);
        assert_eq!(status.level_one, 1);
        assert_eq!(status.level_two, 0);
    }

    #[test]
    fn run_log_records_summary() {
        let store = SqliteCaseStore::open_in_memory().unwrap();
        let result = BatchResult {
            run_id: "run-1".into(),
            total: 3,
            decided: 2,
            failed: 1,
            ..Default::default()
        };
        store.record_run(&result, "scripted", "2026-01-01T00:00:00Z").unwrap();
        assert_eq!(store.run_count().unwrap(), 1);
    }

    #[test]
    fn on_disk_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.db");
        {
            let store = SqliteCaseStore::open(&path).unwrap();
            store.insert_transcripts(&[Some("GCS 15".into())]).unwrap();
            store.save_case(&decided_case(0, TraumaLevel::Two)).unwrap();
        }
        let reopened = SqliteCaseStore::open(&path).unwrap();
        assert_eq!(reopened.load_cases().unwrap()[0].hybrid_level, Some(TraumaLevel::Two));
    }
}
