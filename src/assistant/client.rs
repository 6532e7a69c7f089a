// src/assistant/client.rs

//! Assistant client seam and the HTTP implementation.

use std::future::Future;
use std::pin::Pin;

use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tracing::debug;

use crate::config::AssistantSection;

/// Why a query failed.
///
/// These never escalate: the dispatcher folds them into the query's result
/// and running sessions are unaffected.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("API key environment variable `{0}` is not set")]
    MissingApiKey(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Trait abstracting the remote assistant call.
///
/// Production code uses [`HttpAssistantClient`]; tests provide their own
/// implementation that answers without a network.
pub trait AssistantClient: Send + Sync {
    /// Submit one prompt and resolve to the assistant's plain-text answer.
    fn complete(
        &self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = Result<String, AssistantError>> + Send + '_>>;
}

/// Chat-completions HTTP client.
///
/// Speaks the OpenAI-style `POST /v1/chat/completions` JSON shape; the
/// endpoint, model and key source all come from the `[assistant]` catalog
/// section. Transport timeouts are configured on the underlying client, so
/// a dead network surfaces as [`AssistantError::Timeout`] rather than a
/// hang.
pub struct HttpAssistantClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpAssistantClient {
    /// Build a client from catalog settings, reading the API key from the
    /// configured environment variable.
    pub fn from_config(config: &AssistantSection) -> Result<Self, AssistantError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| AssistantError::MissingApiKey(config.api_key_env.clone()))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn complete_inner(&self, prompt: String) -> Result<String, AssistantError> {
        debug!(model = %self.model, prompt_len = prompt.len(), "sending assistant request");

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?
            .error_for_status()
            .map_err(map_reqwest_error)?;

        let payload: JsonValue = response.json().await.map_err(map_reqwest_error)?;

        payload
            .pointer("/choices/0/message/content")
            .and_then(JsonValue::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                AssistantError::MalformedResponse(
                    "response has no choices[0].message.content".to_string(),
                )
            })
    }
}

impl AssistantClient for HttpAssistantClient {
    fn complete(
        &self,
        prompt: String,
    ) -> Pin<Box<dyn Future<Output = Result<String, AssistantError>> + Send + '_>> {
        Box::pin(self.complete_inner(prompt))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> AssistantError {
    if err.is_timeout() {
        AssistantError::Timeout
    } else {
        AssistantError::Http(err)
    }
}
