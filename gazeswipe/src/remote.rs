//! Remote next-word model.
//!
//! Sends the prompt and the decoded candidates to a user-deployed scoring
//! service and reads back one likelihood per candidate. Disabled by default;
//! the keyboard works without it using the n-gram model or trace scores alone.
//!
//! Uses the `reqwest` blocking client, so calls belong on the ranking worker
//! thread, never on the sampling timeline.

use std::collections::HashMap;
use std::time::Duration;

use gazeswipe_core::{LanguageModelPort, SwipeError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Request body: `{"prompt": "...", "candidates": ["...", ...]}`.
#[derive(Debug, Clone, Serialize)]
struct ScoreRequest<'a> {
    prompt: &'a str,
    candidates: &'a [String],
}

/// Response body: either `{"word": p, ...}` or `[{"word": "...", "probability": p}, ...]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScoreResponse {
    Map(HashMap<String, f64>),
    List(Vec<ScoredWord>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredWord {
    pub word: String,
    pub probability: f64,
}

impl ScoreResponse {
    fn into_map(self) -> HashMap<String, f64> {
        match self {
            ScoreResponse::Map(map) => map,
            ScoreResponse::List(list) => list
                .into_iter()
                .map(|s| (s.word, s.probability))
                .collect(),
        }
    }
}

pub struct RemoteLanguageModel {
    endpoint: String,
    enabled: bool,
    timeout_ms: u64,
}

impl RemoteLanguageModel {
    /// A client for `endpoint`. Starts enabled.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            enabled: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the request timeout in milliseconds.
    pub fn set_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn query_blocking(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, f64>, Box<dyn std::error::Error>> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(self.timeout_ms))
            .build()?;

        let response = client
            .post(&self.endpoint)
            .json(&ScoreRequest { prompt, candidates })
            .send()?
            .error_for_status()?;

        let scores: ScoreResponse = response.json()?;
        Ok(scores.into_map())
    }
}

impl LanguageModelPort for RemoteLanguageModel {
    /// Blocks until the service answers or the timeout elapses. Failures map to
    /// `LanguageModelUnavailable`, which the ranker turns into trace-only
    /// ranking.
    fn next_word_probabilities(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> gazeswipe_core::Result<HashMap<String, f64>> {
        if !self.enabled {
            return Err(SwipeError::LanguageModelUnavailable(
                "remote model disabled".into(),
            ));
        }
        if candidates.is_empty() {
            return Ok(HashMap::new());
        }

        match self.query_blocking(prompt, candidates) {
            Ok(scores) => {
                tracing::debug!(
                    endpoint = %self.endpoint,
                    candidates = candidates.len(),
                    scored = scores.len(),
                    "remote model answered"
                );
                Ok(scores)
            }
            Err(e) => {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "remote model query failed");
                Err(SwipeError::LanguageModelUnavailable(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for RemoteLanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLanguageModel")
            .field("endpoint", &self.endpoint)
            .field("enabled", &self.enabled)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_remote_model() {
        let model = RemoteLanguageModel::new("http://localhost:9/score");
        assert!(model.is_enabled());
        assert_eq!(model.timeout_ms(), DEFAULT_TIMEOUT_MS);
        assert_eq!(model.endpoint(), "http://localhost:9/score");
    }

    #[test]
    fn disabled_model_is_unavailable() {
        let mut model = RemoteLanguageModel::new("http://localhost:9/score");
        model.set_enabled(false);
        let err = model
            .next_word_probabilities("the", &["cat".to_string()])
            .unwrap_err();
        assert!(matches!(err, SwipeError::LanguageModelUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn no_candidates_skip_the_request() {
        let model = RemoteLanguageModel::new("http://localhost:9/score");
        assert!(model.next_word_probabilities("the", &[]).unwrap().is_empty());
    }

    #[test]
    fn response_shapes() {
        let map: ScoreResponse = serde_json::from_str(r#"{"cat": 0.2, "cot": 0.8}"#).unwrap();
        assert_eq!(map.into_map()["cot"], 0.8);

        let list: ScoreResponse =
            serde_json::from_str(r#"[{"word": "cat", "probability": 0.25}]"#).unwrap();
        assert_eq!(list.into_map()["cat"], 0.25);
    }

    #[test]
    fn request_body_shape() {
        let candidates = vec!["cat".to_string(), "cot".to_string()];
        let body = serde_json::to_value(ScoreRequest {
            prompt: "rock the baby in the",
            candidates: &candidates,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"prompt": "rock the baby in the", "candidates": ["cat", "cot"]})
        );
    }

    #[test]
    fn unreachable_endpoint_is_unavailable() {
        let mut model = RemoteLanguageModel::new("http://127.0.0.1:9/score");
        model.set_timeout(200);
        let err = model
            .next_word_probabilities("the", &["cat".to_string()])
            .unwrap_err();
        assert!(matches!(err, SwipeError::LanguageModelUnavailable(_)));
    }

    #[test]
    #[ignore] // Requires a scoring service on localhost:8080
    fn test_local_scoring_service() {
        let model = RemoteLanguageModel::new("http://localhost:8080/score");
        let words = vec!["cot".to_string(), "cat".to_string()];
        let scores = model
            .next_word_probabilities("rock the baby in the", &words)
            .unwrap();
        println!("scores: {:?}", scores);
        assert!(!scores.is_empty());
    }
}
