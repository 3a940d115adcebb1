//! HTTP transport.
//!
//! This module provides:
//! - JSON and SSE chat endpoints over [`ChatService`]
//! - Health and connection self-test endpoints
//! - Optional static hosting of the built UI with SPA fallback
//! - Shared application state

mod handlers;

pub use handlers::*;

use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::chat::ChatService;
use crate::config::{Config, ServerConfig};
use crate::error::AppError;

/// Application state shared across handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Chat pipeline bound to the configured agent.
    pub chat: Arc<ChatService>,
    /// Process start, for uptime reporting.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, chat: ChatService) -> Self {
        info!(
            agent_id = %chat.agent_id(),
            region = %config.agent.region,
            environment = config.server.environment.as_str(),
            "AppState initialized"
        );

        Self {
            config,
            chat: Arc::new(chat),
            started_at: Instant::now(),
        }
    }

    /// Wrap an error for the HTTP response, attaching details where allowed.
    pub fn api_error(&self, error: AppError) -> ApiError {
        ApiError {
            error,
            expose_details: self.config.server.exposes_error_details(),
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

/// Build the application router.
pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/bedrock/chat", post(chat))
        .route("/bedrock/chat/stream", post(chat_stream))
        .route("/bedrock/test", get(test_connection))
        .route("/health", get(health))
        .route("/health/detailed", get(health_detailed))
        .fallback(api_not_found);

    let mut app = Router::new().nest("/api", api);

    if let Some(dir) = &state.config.server.static_dir {
        info!(dir = %dir.display(), "Serving static UI");
        let index = ServeFile::new(dir.join("index.html"));
        app = app.fallback_service(ServeDir::new(dir).fallback(index));
    }

    app.layer(cors_layer(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Permissive when no origins are configured.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

