//! Boundary to the external language-understanding service.
//!
//! The resolver only ever sees a [`Recognition`]: scored intents plus the
//! entities extracted from one utterance. Where they come from is up to the
//! [`Recognizer`] implementation.

pub mod luis;
pub mod scripted;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecognizerError;

pub use luis::LuisRecognizer;
pub use scripted::ScriptedRecognizer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub intent: String,
    pub score: f64,
}

impl IntentScore {
    pub fn new(intent: impl Into<String>, score: f64) -> Self {
        Self {
            intent: intent.into(),
            score,
        }
    }
}

/// One canonical value produced by the recognizer for an entity span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionValue {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Raw matched text.
    pub text: String,
    /// Normalized values, first one wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolution: Vec<ResolutionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            text: text.into(),
            resolution: Vec::new(),
            score: None,
        }
    }

    pub fn with_resolution(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.resolution.push(ResolutionValue {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn has_resolution(&self) -> bool {
        !self.resolution.is_empty()
    }

    /// First resolved value if any, else the raw text.
    pub fn value(&self) -> Value {
        match self.resolution.first() {
            Some(r) => r.value.clone(),
            None => Value::String(self.text.clone()),
        }
    }
}

/// Output of a single recognizer call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    #[serde(default)]
    pub intents: Vec<IntentScore>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Recognition {
    pub fn new(intents: Vec<IntentScore>, entities: Vec<Entity>) -> Self {
        Self { intents, entities }
    }

    /// Highest scoring intent. Ties go to the first one seen.
    pub fn top_intent(&self) -> Option<&IntentScore> {
        let mut best: Option<&IntentScore> = None;
        for candidate in &self.intents {
            if candidate.score.is_nan() {
                continue;
            }
            match best {
                Some(b) if candidate.score <= b.score => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, utterance: &str) -> Result<Recognition, RecognizerError>;
}
