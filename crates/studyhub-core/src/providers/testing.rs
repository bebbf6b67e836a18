//! Scripted providers for unit tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{ProviderError, ProviderResult};

use super::types::{ChatMessage, GenerationOptions, LlmProvider, VisionProvider};

/// Provider that returns fixed results and counts how often it was called
pub(crate) struct ScriptedProvider {
    name: String,
    reply: ProviderResult<String>,
    vision_reply: ProviderResult<String>,
    calls: Arc<AtomicUsize>,
    last_messages: Arc<Mutex<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub(crate) fn ok(name: &str, text: &str) -> Self {
        Self::with_reply(name, Ok(text.to_string()))
    }

    pub(crate) fn failing(name: &str, message: &str) -> Self {
        Self::with_reply(name, Err(ProviderError::request(name, message)))
    }

    pub(crate) fn unavailable(name: &str) -> Self {
        Self::with_reply(name, Err(ProviderError::unavailable(name, "no API key")))
    }

    fn with_reply(name: &str, reply: ProviderResult<String>) -> Self {
        Self {
            name: name.to_string(),
            vision_reply: Err(ProviderError::request(name, "vision not scripted")),
            reply,
            calls: Arc::new(AtomicUsize::new(0)),
            last_messages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_vision(mut self, reply: ProviderResult<String>) -> Self {
        self.vision_reply = reply;
        self
    }

    /// Shared counter, readable after the provider has been boxed
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    /// Messages of the most recent text call
    pub(crate) fn last_messages(&self) -> Arc<Mutex<Vec<ChatMessage>>> {
        self.last_messages.clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        _options: &GenerationOptions,
    ) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        self.reply.clone()
    }
}

#[async_trait]
impl VisionProvider for ScriptedProvider {
    async fn extract_text_from_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.vision_reply.clone()
    }
}
