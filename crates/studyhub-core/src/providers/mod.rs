//! LLM provider layer
//!
//! Google Gemini is the primary provider and the only one with vision. Any
//! OpenAI-compatible endpoint (Groq by default) serves as the secondary.
//! Both implement [`LlmProvider`] and are composed by [`ModelRouter`] for
//! automatic failover.

pub mod gemini;
pub mod openai_compat;
pub mod router;
pub mod types;

pub use gemini::{GeminiConfig, GeminiProvider};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use router::{Attempt, GenerationRequest, ModelRouter, Route};
pub use types::{ChatMessage, ChatRole, GenerationOptions, LlmProvider, VisionProvider};

#[cfg(test)]
pub(crate) mod testing;
