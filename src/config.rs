//! Application constants and oracle settings.
//!
//! Credentials are resolved once at startup. A missing or placeholder API
//! key is a fatal `ConfigError` before any case is touched.

use std::path::PathBuf;

use thiserror::Error;
use zeroize::Zeroizing;

use crate::oracle::ollama::DEFAULT_OLLAMA_BASE_URL;
use crate::oracle::openai::DEFAULT_OPENAI_BASE_URL;
use crate::oracle::{OllamaChatClient, OpenAiClient, OracleError, TextGenerationOracle};

/// Application-level constants
pub const APP_NAME: &str = "triage-consensus";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_OLLAMA_MODEL: &str = "medgemma";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "triage_consensus=info,triage_consensus::triage=info,warn"
}

/// Default batch database: `<data dir>/triage-consensus/batch.db`.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join("batch.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY must be set in the environment or .env file")]
    MissingApiKey,

    #[error("OPENAI_API_KEY is still set to a placeholder value")]
    PlaceholderApiKey,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Oracle client could not be built: {0}")]
    Oracle(#[from] OracleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleBackend {
    OpenAi,
    Ollama,
}

impl OracleBackend {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "TRIAGE_ORACLE",
                value: value.to_string(),
            }),
        }
    }
}

/// Everything needed to construct the oracle client.
pub struct OracleSettings {
    pub backend: OracleBackend,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    api_key: Option<Zeroizing<String>>,
}

impl OracleSettings {
    /// Resolve settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let backend = match non_empty("TRIAGE_ORACLE") {
            Some(v) => OracleBackend::parse(&v)?,
            None => OracleBackend::OpenAi,
        };

        let timeout_secs = match non_empty("TRIAGE_ORACLE_TIMEOUT_SECS") {
            Some(v) => v.trim().parse::<u64>().ok().filter(|s| *s > 0).ok_or(
                ConfigError::InvalidValue {
                    key: "TRIAGE_ORACLE_TIMEOUT_SECS",
                    value: v,
                },
            )?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        match backend {
            OracleBackend::OpenAi => {
                let key = non_empty("OPENAI_API_KEY").ok_or(ConfigError::MissingApiKey)?;
                let key = Zeroizing::new(key.trim().to_string());
                if key.to_ascii_lowercase().contains("your-openai-api-key") {
                    return Err(ConfigError::PlaceholderApiKey);
                }

                Ok(Self {
                    backend,
                    base_url: non_empty("OPENAI_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                    model: non_empty("TRIAGE_MODEL")
                        .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                    timeout_secs,
                    api_key: Some(key),
                })
            }
            OracleBackend::Ollama => Ok(Self {
                backend,
                base_url: non_empty("OLLAMA_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
                model: non_empty("TRIAGE_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
                timeout_secs,
                api_key: None,
            }),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the configured oracle client.
    pub fn build_oracle(&self) -> Result<Box<dyn TextGenerationOracle>, ConfigError> {
        match self.backend {
            OracleBackend::OpenAi => {
                let key = self.api_key.clone().ok_or(ConfigError::MissingApiKey)?;
                Ok(Box::new(OpenAiClient::new(
                    &self.base_url,
                    key,
                    &self.model,
                    self.timeout_secs,
                )?))
            }
            OracleBackend::Ollama => Ok(Box::new(OllamaChatClient::new(
                &self.base_url,
                &self.model,
                self.timeout_secs,
            )?)),
        }
    }
}

impl std::fmt::Debug for OracleSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleSettings")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_key_fails_fast() {
        let err = OracleSettings::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));

        let err = OracleSettings::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn placeholder_key_rejected() {
        let err = OracleSettings::from_lookup(lookup(&[(
            "OPENAI_API_KEY",
            "your-openai-api-key-here",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::PlaceholderApiKey));
    }

    #[test]
    fn openai_defaults() {
        let settings = OracleSettings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-abc")])).unwrap();
        assert_eq!(settings.backend, OracleBackend::OpenAi);
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(settings.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(settings.has_api_key());
        assert!(settings.build_oracle().is_ok());
    }

    #[test]
    fn ollama_needs_no_key() {
        let settings = OracleSettings::from_lookup(lookup(&[
            ("TRIAGE_ORACLE", "Ollama"),
            ("TRIAGE_MODEL", "medgemma:27b"),
        ]))
        .unwrap();
        assert_eq!(settings.backend, OracleBackend::Ollama);
        assert_eq!(settings.base_url, DEFAULT_OLLAMA_BASE_URL);
        assert_eq!(settings.model, "medgemma:27b");
        assert!(!settings.has_api_key());
        assert_eq!(settings.build_oracle().unwrap().name(), "ollama");
    }

    #[test]
    fn unknown_backend_and_bad_timeout_rejected() {
        assert!(matches!(
            OracleSettings::from_lookup(lookup(&[("TRIAGE_ORACLE", "bard")])),
            Err(ConfigError::InvalidValue { key: "TRIAGE_ORACLE", .. })
        ));
        assert!(matches!(
            OracleSettings::from_lookup(lookup(&[
                ("OPENAI_API_KEY", "sk-abc"),
                ("TRIAGE_ORACLE_TIMEOUT_SECS", "0"),
            ])),
            Err(ConfigError::InvalidValue { key: "TRIAGE_ORACLE_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn debug_never_prints_key() {
        let settings = OracleSettings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-secret"));
    }

    #[test]
    fn db_path_under_app_dir() {
        let path = default_db_path();
        assert!(path.ends_with("triage-consensus/batch.db"));
    }

    #[test]
    fn app_name_is_stable() {
        assert_eq!(APP_NAME, "triage-consensus");
    }
}
