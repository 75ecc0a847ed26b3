//! Application startup and lifecycle management.

use axum::middleware::from_fn;
use axum::{routing::get, routing::post, Router};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::services::{GenerationEngine, OpenAiTextProvider, TextProvider};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<GenerationEngine>,
    pub provider: Arc<dyn TextProvider>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let provider = OpenAiTextProvider::new(config.openai.clone());
        if provider.is_configured() {
            tracing::info!(model = %config.openai.model, "AI provider initialized");
        } else {
            tracing::warn!("OpenAI API key not configured - generation requests will fail");
        }
        let provider: Arc<dyn TextProvider> = Arc::new(provider);

        let engine = Arc::new(GenerationEngine::new(
            provider.clone(),
            config.generation.max_attempts,
            Duration::from_millis(config.generation.retry_delay_ms),
        ));

        let state = AppState {
            config: config.clone(),
            engine,
            provider,
        };

        let router = Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics))
            .route(
                "/generate/flashcards",
                post(handlers::generate::flashcards),
            )
            .route("/generate/quiz", post(handlers::generate::quiz))
            .route("/generate/summary", post(handlers::generate::summary))
            .route("/generate/steps", post(handlers::generate::steps))
            .route("/check/work", post(handlers::check::check_work))
            .layer(CorsLayer::permissive())
            .layer(from_fn(metrics_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                }),
            )
            .with_state(state);

        // Port 0 binds a random port for tests.
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("StudyAI service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
