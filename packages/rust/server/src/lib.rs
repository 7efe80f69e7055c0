//! HTTP API for HealthNav.
//!
//! Three routes, each answering with a single JSON object:
//! - `GET /` liveness
//! - `POST /navigate` one pipeline run
//! - `POST /chat` one follow-up turn

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use healthnav_core::{ChatResponder, ConversationStore, Navigator, Services};
use healthnav_shared::{AppConfig, HealthNavError, Result};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub navigator: Arc<Navigator>,
    pub chat: ChatResponder,
}

impl AppState {
    pub fn new(navigator: Navigator, chat: ChatResponder) -> Self {
        Self {
            navigator: Arc::new(navigator),
            chat,
        }
    }

    /// Build production state: real service clients and an empty
    /// conversation store.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let services = Services::from_config(config)?;
        let store = Arc::new(ConversationStore::new());
        let chat = ChatResponder::new(services.llm.clone(), store, config.chat.history_window);
        Ok(Self::new(Navigator::new(services, config), chat))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/navigate", post(handlers::navigate))
        .route("/chat", post(handlers::chat))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| HealthNavError::Server(format!("failed to bind {addr}: {e}")))?;

    let local = listener
        .local_addr()
        .map_err(|e| HealthNavError::Server(e.to_string()))?;
    info!(%local, "HealthNav API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| HealthNavError::Server(e.to_string()))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
