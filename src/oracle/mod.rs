//! Text-generation oracle abstraction.
//!
//! The consensus engine only ever talks to `TextGenerationOracle`: a chat
//! transcript goes in, generated text comes out, or the call fails. Concrete
//! backends (OpenAI, local Ollama) and the scripted test oracle all live
//! behind this trait so arbitration can be exercised without a network.

pub mod ollama;
pub mod openai;
pub mod scripted;

pub use ollama::OllamaChatClient;
pub use openai::OpenAiClient;
pub use scripted::ScriptedOracle;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Oracle is not reachable at {0}")]
    Connection(String),

    #[error("Oracle request timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle rejected credentials: {0}")]
    Auth(String),

    #[error("Oracle rate limit hit (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Oracle returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Text generation capability consumed by the consensus engine.
///
/// Implementations block until the response arrives or the transport fails.
pub trait TextGenerationOracle: Send + Sync {
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, OracleError>;

    /// Short backend label for logs ("openai", "ollama", ...).
    fn name(&self) -> &str;
}

impl<T: TextGenerationOracle + ?Sized> TextGenerationOracle for Box<T> {
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, OracleError> {
        (**self).complete(messages, temperature)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Map a reqwest transport failure onto the oracle error taxonomy.
pub(crate) fn transport_error(err: reqwest::Error, base_url: &str, timeout_secs: u64) -> OracleError {
    if err.is_connect() {
        OracleError::Connection(base_url.to_string())
    } else if err.is_timeout() {
        OracleError::Timeout(timeout_secs)
    } else {
        OracleError::Http(err.to_string())
    }
}
