use async_trait::async_trait;
use std::collections::HashMap;

use super::{Recognition, Recognizer};
use crate::error::RecognizerError;

/// Deterministic recognizer backed by a fixed utterance table.
///
/// Lookups are trimmed and case-insensitive. Unknown utterances recognize
/// as nothing (no intents, no entities).
#[derive(Debug, Clone, Default)]
pub struct ScriptedRecognizer {
    script: HashMap<String, Recognition>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, utterance: &str, recognition: Recognition) -> Self {
        self.insert(utterance, recognition);
        self
    }

    pub fn insert(&mut self, utterance: &str, recognition: Recognition) {
        self.script.insert(normalize(utterance), recognition);
    }

    /// Loads a JSON object of `utterance -> recognition`.
    pub fn from_json(raw: &str) -> Result<Self, RecognizerError> {
        let table: HashMap<String, Recognition> = serde_json::from_str(raw)?;
        let mut recognizer = Self::new();
        for (utterance, recognition) in table {
            recognizer.insert(&utterance, recognition);
        }
        Ok(recognizer)
    }
}

fn normalize(utterance: &str) -> String {
    utterance.trim().to_lowercase()
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, utterance: &str) -> Result<Recognition, RecognizerError> {
        Ok(self
            .script
            .get(&normalize(utterance))
            .cloned()
            .unwrap_or_default())
    }
}
