//! OpenAI-compatible provider for Groq, Together, Ollama, LM Studio, etc.
//!
//! Speaks the OpenAI chat-completions wire format against a configurable base
//! URL. Its role vocabulary already covers system/user/assistant, so messages
//! are passed through without translation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};

use super::types::{ChatMessage, GenerationOptions, LlmProvider};

/// Settings for [`OpenAiCompatProvider`]
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// Human-readable label (e.g. "groq", "ollama")
    pub name: String,
    pub api_key: String,
    /// Endpoint root without the `/v1` suffix (e.g. `https://api.groq.com/openai`)
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            name: "groq".to_string(),
            api_key: String::new(),
            base_url: "https://api.groq.com/openai".to_string(),
            model: "llama-3.1-70b-versatile".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout: Duration::from_secs(120),
        }
    }
}

impl std::fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// OpenAI-compatible chat provider
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

impl std::fmt::Debug for OpenAiCompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatProvider")
            .field("config", &self.config)
            .finish()
    }
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client for {}: {}", config.name, e);
                Client::new()
            });

        Self { client, config }
    }

    fn request_error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::request(self.config.name.clone(), message)
    }

    fn to_openai_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    /// Pull the reply text out of the first choice
    fn response_text(&self, resp: OpenAiApiResponse) -> ProviderResult<String> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.request_error("response had no choices"))?;

        choice
            .message
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                self.request_error(format!(
                    "response had no content (finish reason: {})",
                    choice.finish_reason.as_deref().unwrap_or("unknown")
                ))
            })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> ProviderResult<String> {
        if self.config.api_key.is_empty() {
            return Err(self.request_error("API key not configured"));
        }
        if messages.is_empty() {
            return Err(self.request_error("No messages to send"));
        }

        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = OpenAiRequest {
            model: &self.config.model,
            messages: Self::to_openai_messages(messages),
            temperature: options.temperature.unwrap_or(self.config.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
        };

        debug!(
            "{} request: model={}, messages={}",
            self.config.name,
            self.config.model,
            body.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                self.request_error(format!("Failed to send request: {}", e.without_url()))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(self.request_error(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: OpenAiApiResponse = response
            .json()
            .await
            .map_err(|e| {
                self.request_error(format!("Failed to parse API response: {}", e.without_url()))
            })?;

        debug!(
            "{} response: choices={}, finish_reason={:?}",
            self.config.name,
            api_response.choices.len(),
            api_response.choices.first().map(|c| &c.finish_reason)
        );

        self.response_text(api_response)
    }
}

// ── OpenAI wire types ──

#[derive(Debug, Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiApiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<String>,
}
