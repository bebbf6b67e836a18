//! studyhub-core - the model-facing half of studyhub
//!
//! This crate provides:
//! - Provider adapters for Google Gemini (primary, with vision) and any
//!   OpenAI-compatible chat endpoint such as Groq (secondary)
//! - A [`ModelRouter`] that tries the primary and fails over to the secondary
//! - A response normalizer that turns loose model text into fixed-shape payloads
//! - Study feature services built on top of both

pub mod error;
pub mod normalize;
pub mod providers;
pub mod study;
pub mod upload;

// Re-export main types for convenience
pub use error::{GenerationFailed, ProviderError, UploadError};
pub use normalize::{Normalized, extract_json, normalize};
pub use providers::{
    ChatMessage, ChatRole, GenerationOptions, LlmProvider, ModelRouter, VisionProvider,
};
pub use study::{
    Essentials, EssentialsReport, MarksDistribution, RevisionPlan, StudyAssistant, SurvivalPlan,
    SurvivalPlanRequest,
};
pub use upload::UploadedFile;
