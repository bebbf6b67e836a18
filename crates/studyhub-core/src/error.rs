//! Error types shared by providers, the router and upload handling

use thiserror::Error;

/// Result type for a single provider call
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure of one provider call. The router absorbs these; callers only ever
/// see [`GenerationFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider's client handle was never created (usually a missing credential)
    #[error("{provider} not available: {reason}")]
    Unavailable { provider: String, reason: String },

    /// The call went out and failed: transport, status code or response shape
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },
}

impl ProviderError {
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Name of the provider that produced this error
    pub fn provider(&self) -> &str {
        match self {
            Self::Unavailable { provider, .. } | Self::Request { provider, .. } => provider,
        }
    }

    /// The failure text without the provider prefix
    pub fn reason(&self) -> &str {
        match self {
            Self::Unavailable { reason, .. } => reason,
            Self::Request { message, .. } => message,
        }
    }
}

/// Every provider in the attempt plan failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("AI generation failed: {last_error}")]
pub struct GenerationFailed {
    /// Reason reported by the last provider attempted
    pub last_error: String,
}

impl GenerationFailed {
    pub fn new(last_error: impl Into<String>) -> Self {
        Self {
            last_error: last_error.into(),
        }
    }
}

/// Rejected upload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Only images (JPG, PNG), PDFs, and MP4 videos are allowed")]
    UnsupportedType { name: String, mime_type: String },
}
