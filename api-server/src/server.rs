use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use share_queue::ShareManager;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::{error, info};

use crate::auth::require_api_token;
use crate::config::Config;
use crate::handlers;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: ShareManager,
    pub max_limit: u32,
    pub default_history: usize,
    /// Bearer token for mutating routes. `None` restricts them to loopback.
    pub api_token: Option<Arc<str>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(manager: ShareManager, config: &Config) -> Self {
        Self {
            manager,
            max_limit: config.limits.max_limit,
            default_history: config.limits.default_history,
            api_token: config.server.api_token.as_deref().map(Arc::from),
            started_at: Instant::now(),
        }
    }
}

pub fn build_app(state: AppState, request_timeout_secs: u64) -> Router {
    let read_routes = Router::new()
        .route("/api/share/{id}", get(handlers::get_share))
        .route("/api/share/{id}/progress", get(handlers::get_share))
        .route("/api/history", get(handlers::history))
        .route("/api/running-shares", get(handlers::running_shares))
        .route("/api/stats", get(handlers::stats))
        .route("/api/health", get(handlers::health));

    let write_routes = Router::new()
        .route("/api/share", post(handlers::create_share))
        .route("/api/share/{id}/cancel", post(handlers::cancel_share))
        .route("/api/clear-history", post(handlers::clear_history))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    Router::new()
        .merge(read_routes)
        .merge(write_routes)
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_secs),
        ))
        .layer(CorsLayer::permissive())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
