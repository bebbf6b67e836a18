//! Model router with one-step failover from the primary to the secondary provider
//!
//! Every request runs an explicit attempt plan: the primary first, then the
//! secondary if the primary failed for any reason. Image requests only have
//! the primary step since the secondary cannot read images. There are no
//! retries inside a provider and no state carried between requests.

use tracing::{error, info, warn};

use crate::error::{GenerationFailed, ProviderError, ProviderResult};

use super::types::{ChatMessage, GenerationOptions, LlmProvider, VisionProvider};

/// A step in the attempt plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Primary,
    Secondary,
}

/// The three request shapes the router accepts
#[derive(Debug, Clone, Copy)]
pub enum GenerationRequest<'a> {
    Prompt(&'a str),
    History(&'a [ChatMessage]),
    Image {
        image: &'a [u8],
        mime_type: &'a str,
        prompt: &'a str,
    },
}

/// Outcome of one step, tagged with where it ran
#[derive(Debug, Clone)]
pub struct Attempt {
    pub route: Route,
    pub provider: String,
    pub outcome: ProviderResult<String>,
}

/// Routes requests to the primary provider with failover to the secondary
pub struct ModelRouter {
    primary: Box<dyn VisionProvider>,
    secondary: Box<dyn LlmProvider>,
}

impl ModelRouter {
    pub fn new(primary: Box<dyn VisionProvider>, secondary: Box<dyn LlmProvider>) -> Self {
        Self { primary, secondary }
    }

    /// Ordered steps for a request
    pub fn plan(request: &GenerationRequest<'_>) -> Vec<Route> {
        match request {
            GenerationRequest::Image { .. } => vec![Route::Primary],
            GenerationRequest::Prompt(_) | GenerationRequest::History(_) => {
                vec![Route::Primary, Route::Secondary]
            }
        }
    }

    fn provider_name(&self, route: Route) -> &str {
        match route {
            Route::Primary => self.primary.provider_name(),
            Route::Secondary => self.secondary.provider_name(),
        }
    }

    /// Run a single step of the plan
    pub async fn attempt(
        &self,
        route: Route,
        request: &GenerationRequest<'_>,
        options: &GenerationOptions,
    ) -> Attempt {
        let provider = self.provider_name(route).to_string();
        info!("Calling {}...", provider);

        let outcome = match (route, request) {
            (Route::Primary, GenerationRequest::Prompt(prompt)) => {
                self.primary.generate_single(prompt, options).await
            }
            (Route::Primary, GenerationRequest::History(messages)) => {
                self.primary.generate(messages, options).await
            }
            (
                Route::Primary,
                GenerationRequest::Image {
                    image,
                    mime_type,
                    prompt,
                },
            ) => {
                self.primary
                    .extract_text_from_image(image, mime_type, prompt)
                    .await
            }
            (Route::Secondary, GenerationRequest::Prompt(prompt)) => {
                self.secondary.generate_single(prompt, options).await
            }
            (Route::Secondary, GenerationRequest::History(messages)) => {
                self.secondary.generate(messages, options).await
            }
            (Route::Secondary, GenerationRequest::Image { .. }) => Err(ProviderError::request(
                provider.clone(),
                "image input is not supported",
            )),
        };

        match &outcome {
            Ok(_) => info!("{} response received", provider),
            Err(e) => warn!("{} failed: {}", provider, e.reason()),
        }

        Attempt {
            route,
            provider,
            outcome,
        }
    }

    /// Walk the attempt plan until one step succeeds
    pub async fn run(
        &self,
        request: GenerationRequest<'_>,
        options: &GenerationOptions,
    ) -> Result<String, GenerationFailed> {
        let plan = Self::plan(&request);
        let mut last_error = None;

        for (idx, route) in plan.iter().enumerate() {
            let attempt = self.attempt(*route, &request, options).await;
            match attempt.outcome {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if let Some(next) = plan.get(idx + 1) {
                        warn!(
                            "Switching from {} to {} fallback",
                            attempt.provider,
                            self.provider_name(*next)
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            ProviderError::request("router", "no provider attempted")
        });
        error!("All providers failed: {}", last_error);
        // provider identity stays in the logs
        Err(GenerationFailed::new(last_error.reason()))
    }

    /// One-shot generation from a single prompt
    pub async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationFailed> {
        self.run(GenerationRequest::Prompt(prompt), options).await
    }

    /// Generation from an ordered conversation
    pub async fn generate_with_history(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String, GenerationFailed> {
        self.run(GenerationRequest::History(messages), options).await
    }

    /// Image-to-text on the primary provider; there is no secondary path
    pub async fn extract_text_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, GenerationFailed> {
        self.run(
            GenerationRequest::Image {
                image,
                mime_type,
                prompt,
            },
            &GenerationOptions::default(),
        )
        .await
    }

    /// Provider names in failover order
    pub fn provider_names(&self) -> Vec<&str> {
        vec![self.primary.provider_name(), self.secondary.provider_name()]
    }
}
