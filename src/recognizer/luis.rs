use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Entity, IntentScore, Recognition, Recognizer, ResolutionValue};
use crate::config::LuisConfig;
use crate::error::RecognizerError;

/// Queries a published LUIS (v2) application over HTTP.
#[derive(Clone)]
pub struct LuisRecognizer {
    client: Client,
    url: String,
    subscription_key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LuisResponse {
    #[serde(default)]
    top_scoring_intent: Option<LuisIntent>,
    #[serde(default)]
    intents: Vec<LuisIntent>,
    #[serde(default)]
    entities: Vec<LuisEntity>,
}

#[derive(Deserialize)]
struct LuisIntent {
    intent: String,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Deserialize)]
struct LuisEntity {
    entity: String,
    #[serde(rename = "type")]
    entity_type: String,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    resolution: Option<Map<String, Value>>,
}

impl LuisRecognizer {
    pub fn new(config: &LuisConfig) -> Result<Self, RecognizerError> {
        if config.app_id.trim().is_empty() {
            return Err(RecognizerError::NotConfigured("LUIS app id is empty".to_string()));
        }
        if config.subscription_key.trim().is_empty() {
            return Err(RecognizerError::NotConfigured(
                "LUIS subscription key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            url: format!(
                "{}/luis/v2.0/apps/{}",
                config.endpoint.trim_end_matches('/'),
                config.app_id
            ),
            subscription_key: config.subscription_key.clone(),
        })
    }
}

#[async_trait]
impl Recognizer for LuisRecognizer {
    async fn recognize(&self, utterance: &str) -> Result<Recognition, RecognizerError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("subscription-key", self.subscription_key.as_str()),
                ("verbose", "true"),
                ("q", utterance),
            ])
            .send()
            .await
            .map_err(|e| RecognizerError::Http(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "LUIS query rejected");
            return Err(RecognizerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| RecognizerError::Http(e.without_url()))?;
        let recognition = parse_response(&raw)?;
        debug!(
            intents = recognition.intents.len(),
            entities = recognition.entities.len(),
            "LUIS query answered"
        );
        Ok(recognition)
    }
}

/// Maps the LUIS v2 JSON body into a [`Recognition`].
pub fn parse_response(raw: &str) -> Result<Recognition, RecognizerError> {
    let body: LuisResponse = serde_json::from_str(raw)?;

    let mut intents: Vec<IntentScore> = body
        .intents
        .into_iter()
        .map(|i| IntentScore::new(i.intent, i.score.unwrap_or(0.0)))
        .collect();

    // Non-verbose answers only carry the top intent.
    if intents.is_empty() {
        if let Some(top) = body.top_scoring_intent {
            intents.push(IntentScore::new(top.intent, top.score.unwrap_or(0.0)));
        }
    }

    let entities = body
        .entities
        .into_iter()
        .map(|e| Entity {
            entity_type: e.entity_type,
            text: e.entity,
            resolution: e
                .resolution
                .map(|map| {
                    map.into_iter()
                        .map(|(key, value)| ResolutionValue { key, value })
                        .collect()
                })
                .unwrap_or_default(),
            score: e.score,
        })
        .collect();

    Ok(Recognition { intents, entities })
}
