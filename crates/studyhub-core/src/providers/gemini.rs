//! Google Gemini provider (primary, with vision)

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{ProviderError, ProviderResult};

use super::types::{ChatMessage, ChatRole, GenerationOptions, LlmProvider, VisionProvider};

const PROVIDER_NAME: &str = "gemini";
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Settings for [`GeminiProvider`]
#[derive(Clone)]
pub struct GeminiConfig {
    /// Without a key the provider stays uninitialized and every call reports `Unavailable`
    pub api_key: Option<String>,
    pub model: String,
    pub vision_model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            vision_model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            max_tokens: 8192,
            timeout: Duration::from_secs(120),
        }
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Client handle, created once on first successful initialization
struct GeminiClient {
    http: Client,
    api_key: String,
}

/// Google Gemini provider
pub struct GeminiProvider {
    config: GeminiConfig,
    handle: OnceLock<GeminiClient>,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.config.model)
            .field("vision_model", &self.config.vision_model)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl GeminiProvider {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            handle: OnceLock::new(),
        }
    }

    /// Create the client handle if a credential is configured.
    ///
    /// Idempotent: once a handle exists this returns `true` without doing anything.
    pub fn initialize(&self) -> bool {
        if self.handle.get().is_some() {
            return true;
        }

        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return false;
        };

        let http = match Client::builder().timeout(self.config.timeout).build() {
            Ok(http) => http,
            Err(e) => {
                error!("Failed to initialize Gemini client: {}", e);
                return false;
            }
        };

        let client = GeminiClient {
            http,
            api_key: api_key.to_string(),
        };
        if self.handle.set(client).is_ok() {
            info!(
                "Gemini client initialized (model: {}, vision: {})",
                self.config.model, self.config.vision_model
            );
        }
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.get().is_some()
    }

    fn client(&self) -> ProviderResult<&GeminiClient> {
        if !self.initialize() {
            return Err(ProviderError::unavailable(
                PROVIDER_NAME,
                "Gemini client not initialized (GEMINI_API_KEY not configured)",
            ));
        }
        self.handle
            .get()
            .ok_or_else(|| ProviderError::unavailable(PROVIDER_NAME, "Gemini client not initialized"))
    }

    /// Map one message onto a Gemini turn. Gemini has no system role, so system
    /// messages become user turns tagged as instructions.
    fn to_gemini_turn(message: &ChatMessage) -> GeminiContent {
        let (role, text) = match message.role {
            ChatRole::System => ("user", format!("[System]: {}", message.content)),
            ChatRole::Assistant => ("model", message.content.clone()),
            ChatRole::User => ("user", message.content.clone()),
        };
        GeminiContent {
            role: role.to_string(),
            parts: vec![GeminiPart::Text { text }],
        }
    }

    /// Split a conversation into prior turns and the new turn to send
    fn to_gemini_history(messages: &[ChatMessage]) -> Option<(Vec<GeminiContent>, GeminiContent)> {
        let (last, history) = messages.split_last()?;
        let history = history.iter().map(Self::to_gemini_turn).collect();
        let new_turn = GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart::Text {
                text: last.content.clone(),
            }],
        };
        Some((history, new_turn))
    }

    fn generation_config(&self, options: &GenerationOptions) -> GeminiGenerationConfig {
        GeminiGenerationConfig {
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_output_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        contents: Vec<GeminiContent>,
        generation_config: GeminiGenerationConfig,
    ) -> ProviderResult<String> {
        let client = self.client()?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let body = GeminiRequest {
            contents,
            generation_config,
        };

        debug!(
            "Gemini request: model={}, contents={}",
            model,
            body.contents.len()
        );

        let response = client
            .http
            .post(&url)
            .header("x-goog-api-key", &client.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ProviderError::request(
                    PROVIDER_NAME,
                    format!("Failed to send request to Gemini API: {}", e.without_url()),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::request(
                PROVIDER_NAME,
                format!("Gemini API request failed with status {}: {}", status, error_text),
            ));
        }

        let api_response: GeminiApiResponse = response.json().await.map_err(|e| {
            ProviderError::request(
                PROVIDER_NAME,
                format!("Failed to parse Gemini API response: {}", e.without_url()),
            )
        })?;

        debug!(
            "Gemini response: candidates={}",
            api_response.candidates.len()
        );

        Self::response_text(api_response)
    }

    /// Concatenate the text parts of the first candidate
    fn response_text(resp: GeminiApiResponse) -> ProviderResult<String> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::request(PROVIDER_NAME, "Gemini response had no candidates"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::request(
                PROVIDER_NAME,
                format!(
                    "Gemini response contained no text (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> ProviderResult<String> {
        let (mut contents, new_turn) = Self::to_gemini_history(messages)
            .ok_or_else(|| ProviderError::request(PROVIDER_NAME, "No messages to send"))?;
        contents.push(new_turn);

        self.generate_content(&self.config.model, contents, self.generation_config(options))
            .await
    }

    async fn generate_single(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> ProviderResult<String> {
        let contents = vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![GeminiPart::Text {
                text: prompt.to_string(),
            }],
        }];

        self.generate_content(&self.config.model, contents, self.generation_config(options))
            .await
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    async fn extract_text_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> ProviderResult<String> {
        let contents = vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![
                GeminiPart::Text {
                    text: prompt.to_string(),
                },
                GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: mime_type.to_string(),
                        data: BASE64.encode(image),
                    },
                },
            ],
        }];

        debug!(
            "Gemini vision request: {} bytes of {}",
            image.len(),
            mime_type
        );

        self.generate_content(
            &self.config.vision_model,
            contents,
            self.generation_config(&GenerationOptions::default()),
        )
        .await
    }
}

// ── Gemini wire types ──

#[derive(Debug, Clone, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Clone, Copy, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}
