//! HTTP relay server for voicebot
//!
//! Exposes `/chat` (text in, reply text and synthesized speech out) and
//! `/health`, optionally serving a web UI from a static directory.

pub mod chat;
pub mod headers;
pub mod health;
pub mod rate_limit;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, Method, header};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::llm::ChatModel;
use crate::voice::Synthesizer;

/// Largest accepted request body (JSON)
pub const BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Information about the configured upstream providers
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ModelInfo {
    pub llm_model: String,
    pub tts_provider: String,
}

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub llm: Arc<dyn ChatModel>,
    pub tts: Arc<dyn Synthesizer>,
    pub model_info: ModelInfo,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    llm: Arc<dyn ChatModel>,
    tts: Arc<dyn Synthesizer>,
    port: u16,
    static_dir: Option<PathBuf>,
    model_info: ModelInfo,
    rate_limit_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(llm: Arc<dyn ChatModel>, tts: Arc<dyn Synthesizer>, port: u16) -> Self {
        Self {
            llm,
            tts,
            port,
            static_dir: None,
            model_info: ModelInfo::default(),
            rate_limit_per_minute: None,
        }
    }

    /// Set the static files directory for serving the web UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Set the model info reported by `/ready`
    #[must_use]
    pub fn model_info(mut self, info: ModelInfo) -> Self {
        self.model_info = info;
        self
    }

    /// Enable a global requests-per-minute limit
    #[must_use]
    pub const fn rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limit_per_minute = requests_per_minute;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.rate_limit_per_minute.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            llm: self.llm,
            tts: self.tts,
            model_info: self.model_info,
            rate_limiter,
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes and layers
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(chat::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // Mirror the caller's origin so credentialed requests are accepted
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static("x-requested-with"),
            ]);

        router
            .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
            .layer(axum::middleware::from_fn(headers::security_headers))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails while running
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
