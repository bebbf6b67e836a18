//! Gateway HTTP server - axum router, shared state and status endpoint

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use studyhub_core::StudyAssistant;
use studyhub_core::upload::MAX_UPLOAD_BYTES;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Shared state for all handlers
#[derive(Clone)]
pub struct GatewayState {
    pub assistant: Arc<StudyAssistant>,
    pub start_time: std::time::Instant,
    pub started_at: DateTime<Utc>,
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, assistant: Arc<StudyAssistant>) -> Self {
        let state = GatewayState {
            assistant,
            start_time: std::time::Instant::now(),
            started_at: Utc::now(),
        };
        Self { state, bind }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(status_handler))
            .route(
                "/api/essentials/extract",
                post(routes::extract_essentials)
                    .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
            )
            .route("/api/survivalplan", post(routes::survival_plan))
            .route(
                "/api/survivalplan/structured",
                post(routes::structured_survival_plan),
            )
            .route("/api/revision/plan", post(routes::revision_plan))
            .route("/api/doubts/solve", post(routes::solve_doubt))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Gateway stopped");
        Ok(())
    }
}

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let providers = state.assistant.router().provider_names();

    axum::Json(serde_json::json!({
        "status": "ok",
        "providers": providers,
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime,
    }))
}
