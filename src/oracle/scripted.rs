//! Scripted oracle: replays a fixed queue of responses and records every
//! call it receives. Used by the engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use super::{ChatMessage, OracleError, TextGenerationOracle};

/// One recorded oracle call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

pub struct ScriptedOracle {
    responses: Mutex<VecDeque<Result<String, OracleError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedOracle {
    /// Oracle answering successive calls with the given texts.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    /// Oracle whose script may include failures.
    pub fn from_results<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = Result<String, OracleError>>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of all calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl TextGenerationOracle for ScriptedOracle {
    fn complete(&self, messages: &[ChatMessage], temperature: f32) -> Result<String, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                temperature,
            });
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|_| OracleError::Http("scripted oracle lock poisoned".into()))?;

        responses
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::MalformedResponse("script exhausted".into())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_in_order_and_records_calls() {
        let oracle = ScriptedOracle::new(["first", "second"]);
        let msgs = [ChatMessage::user("a")];

        assert_eq!(oracle.complete(&msgs, 0.1).unwrap(), "first");
        assert_eq!(oracle.complete(&msgs, 0.3).unwrap(), "second");
        assert_eq!(oracle.call_count(), 2);
        assert!((oracle.calls()[1].temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(oracle.remaining(), 0);
    }

    #[test]
    fn exhausted_script_fails() {
        let oracle = ScriptedOracle::new(Vec::<String>::new());
        assert!(matches!(
            oracle.complete(&[], 0.1),
            Err(OracleError::MalformedResponse(_))
        ));
    }

    #[test]
    fn scripted_failures_surface() {
        let oracle = ScriptedOracle::from_results([Err(OracleError::Timeout(30))]);
        assert!(matches!(oracle.complete(&[], 0.1), Err(OracleError::Timeout(30))));
    }
}
