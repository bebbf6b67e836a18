//! Canned providers and request helpers for route tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use serde_json::Value;
use studyhub_core::error::ProviderResult;
use studyhub_core::{
    ChatMessage, GenerationOptions, LlmProvider, ModelRouter, ProviderError, StudyAssistant,
    VisionProvider,
};

use crate::GatewayServer;

/// Provider with a fixed reply; every call bumps a counter shared by all providers of a gateway
pub(crate) struct CannedProvider {
    name: &'static str,
    reply: ProviderResult<String>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LlmProvider for CannedProvider {
    fn provider_name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "canned"
    }

    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _options: &GenerationOptions,
    ) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

#[async_trait]
impl VisionProvider for CannedProvider {
    async fn extract_text_from_image(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .as_ref()
            .map(|_| "Unit 1: Thermodynamics".to_string())
            .map_err(Clone::clone)
    }
}

fn build(
    primary: ProviderResult<String>,
    secondary: ProviderResult<String>,
) -> (GatewayServer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = ModelRouter::new(
        Box::new(CannedProvider {
            name: "gemini",
            reply: primary,
            calls: calls.clone(),
        }),
        Box::new(CannedProvider {
            name: "groq",
            reply: secondary,
            calls: calls.clone(),
        }),
    );
    let assistant = Arc::new(StudyAssistant::new(Arc::new(router)));
    let bind = "127.0.0.1:0".parse().unwrap();
    (GatewayServer::new(bind, assistant), calls)
}

/// Gateway whose primary answers every request with `reply`
pub(crate) fn gateway(reply: &str) -> (GatewayServer, Arc<AtomicUsize>) {
    build(
        Ok(reply.to_string()),
        Err(ProviderError::request("groq", "should not be called")),
    )
}

/// Gateway where both providers fail
pub(crate) fn failing_gateway() -> (GatewayServer, Arc<AtomicUsize>) {
    build(
        Err(ProviderError::unavailable("gemini", "no API key")),
        Err(ProviderError::request("groq", "status 401: invalid key")),
    )
}

pub(crate) fn json_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) fn multipart_request(field: &str, file_name: &str, mime: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "studyhub-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/essentials/extract")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub(crate) async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
