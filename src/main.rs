//! Triage consensus batch tool.
//!
//! Usage:
//!   triage-consensus import transcripts.jsonl
//!   triage-consensus run
//!   triage-consensus status
//!   triage-consensus export results.json

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;

use triage_consensus::config::{self, ConfigError, OracleSettings};
use triage_consensus::store::json::{read_transcripts, write_export};
use triage_consensus::store::{CaseStore, SqliteCaseStore, StoreError};
use triage_consensus::triage::{
    ConsensusConfig, ConsensusEngine, FixedDelayPacer, RetryPolicy, DEFAULT_TEMPERATURE,
};

#[derive(Parser, Debug)]
#[command(name = "triage-consensus", version)]
#[command(about = "Hybrid multi-prompt pediatric trauma triage over EMS transcripts")]
struct Cli {
    /// Batch database path
    #[arg(long, env = "TRIAGE_DB", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append transcripts from a JSON array or JSON Lines file
    Import { file: PathBuf },

    /// Decide every undecided row with a transcript
    Run {
        /// Pause after each decided case (and after tie-break calls), in ms
        #[arg(long, env = "TRIAGE_CASE_DELAY_MS", default_value = "1200")]
        delay_ms: u64,

        /// Attempts per case before leaving it for the next run
        #[arg(long, env = "TRIAGE_MAX_ATTEMPTS", default_value = "1")]
        max_attempts: u32,

        /// First retry backoff in ms (doubles per attempt)
        #[arg(long, default_value = "2000")]
        retry_base_ms: u64,

        /// Sampling temperature for every pass
        #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
        temperature: f32,
    },

    /// Show decided / pending counts
    Status,

    /// Write all rows with their audit trail as JSON
    Export { file: PathBuf },
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    triage_consensus::init_tracing();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "triage-consensus failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let db_path = cli.db.unwrap_or_else(config::default_db_path);

    match cli.command {
        Command::Import { file } => {
            let transcripts = read_transcripts(&file)?;
            let store = open_store(&db_path)?;
            let count = store.insert_transcripts(&transcripts)?;
            println!("Imported {count} transcripts into {}", db_path.display());
        }
        Command::Run {
            delay_ms,
            max_attempts,
            retry_base_ms,
            temperature,
        } => {
            // Credentials first: nothing is processed without a usable oracle.
            let settings = OracleSettings::from_env()?;
            let oracle = settings.build_oracle()?;
            tracing::info!(backend = ?settings.backend, model = %settings.model, "Oracle configured");

            let store = open_store(&db_path)?;
            let mut cases = store.load_cases()?;

            let delay = Duration::from_millis(delay_ms);
            let pacer = FixedDelayPacer::new(delay, delay);
            let consensus_config = ConsensusConfig {
                temperature,
                retry: RetryPolicy {
                    max_attempts: max_attempts.max(1),
                    base_delay: Duration::from_millis(retry_base_ms),
                },
            };
            let engine = ConsensusEngine::new(oracle.as_ref(), &pacer, consensus_config);

            let started_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
            let result = engine.process_batch_with(&mut cases, Some(&store), None);

            store.save_all(&cases)?;
            store.record_run(&result, oracle.name(), &started_at)?;

            println!(
                "Run {}: {} decided (L1 {}, L2 {}, tie-breaks {}), {} failed, {} already decided, {} empty",
                result.run_id,
                result.decided,
                result.level_one,
                result.level_two,
                result.tiebreaks,
                result.failed,
                result.already_decided,
                result.skipped_empty,
            );
            for error in &result.errors {
                println!("  {error}");
            }
        }
        Command::Status => {
            let status = open_store(&db_path)?.status()?;
            println!(
                "{} rows: {} decided (L1 {}, L2 {}, tie-breaks {}), {} pending, {} empty",
                status.total,
                status.decided,
                status.level_one,
                status.level_two,
                status.tiebreaks,
                status.pending,
                status.empty,
            );
        }
        Command::Export { file } => {
            let cases = open_store(&db_path)?.load_cases()?;
            write_export(&file, &cases)?;
            println!("Exported {} rows to {}", cases.len(), file.display());
        }
    }

    Ok(())
}

fn open_store(path: &std::path::Path) -> Result<SqliteCaseStore, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteCaseStore::open(path)?)
}
