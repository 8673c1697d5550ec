pub mod config;
pub mod oracle; // Text-generation oracle trait + backends
pub mod store; // SQLite batch table
pub mod triage; // Hybrid multi-prompt consensus engine

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber (`RUST_LOG` wins over the default).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
