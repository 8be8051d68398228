//! OpenRouter chat completion client

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, OpenRouterConfig};

pub const SYSTEM_PROMPT: &str = "You are a professional corporate email generator. \
Always produce clean, direct, and professional outputs.";

/// Prefix of every completion failure shown in the form
pub const WARNING_MARKER: &str = "⚠️";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unable to parse response: {0}")]
    Parse(String),

    #[error("no completion returned")]
    EmptyResponse,
}

/// Anything able to turn a prompt into text
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError>;
}

/// Fail-soft rendering: failures become a displayable warning string
pub fn display_text(result: Result<String, CompletionError>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => format!("{} Error contacting OpenRouter: {}", WARNING_MARKER, e),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout_secs: u64,
}

impl OpenRouterClient {
    pub fn new(config: &OpenRouterConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                var: "OPENROUTER_TIMEOUT_SECS".to_string(),
                value: e.to_string(),
            })?;

        Ok(OpenRouterClient {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the fixed system instruction plus `prompt` to `model`
    pub async fn complete_with_model(
        &self,
        prompt: &str,
        max_tokens: u32,
        model: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens,
        };

        debug!(
            "Sending completion request to {} (model: {}, max_tokens: {})",
            self.endpoint, model, max_tokens
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout(self.timeout_secs)
                } else {
                    CompletionError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("OpenRouter returned {}", status);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or(CompletionError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionService for OpenRouterClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError> {
        self.complete_with_model(prompt, max_tokens, &self.model).await
    }
}
