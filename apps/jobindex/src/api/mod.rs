//! # jobindex HTTP API Module
//!
//! This module implements the HTTP push endpoints using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /events` - Index the object named by an `ObjectChangeEvent`
//! - `POST /pubsub` - Index the object named by a Pub/Sub push message
//! - `GET /objects` - List stored object names (`?bucket=&prefix=`)
//!
//! ## Push Admission
//!
//! Configured under `[server]` (see [`crate::config`]):
//!
//! - `push_token`: required as `Authorization: Bearer` or `?token=` (not on `/health`)
//! - `subscriptions`: Pub/Sub subscriptions allowed to push to `/pubsub`
//! - `rate_limit`: deliveries per second, 0 disables

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::PushGuard;
pub use middleware::PushLimiter;
pub use types::{
    EVENT_TYPE_ATTR, EntryJson, ErrorResponse, HealthResponse, IndexResponse, ListParams,
    ListResponse, OBJECT_FINALIZE, PubSubMessage, PubSubPush,
};

use crate::config::AppConfig;
use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};
use jobindex_core::{IndexError, ObjectStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state. Invocations share only the store; the guard and
/// the limiter are fixed when the server starts.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ObjectStore>,
    pub config: Arc<AppConfig>,
    pub guard: Arc<PushGuard>,
    pub limiter: Option<Arc<PushLimiter>>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, config: AppConfig) -> Self {
        let guard = PushGuard::from_config(&config.server);
        let limiter = PushLimiter::new(config.server.rate_limit).map(Arc::new);
        Self {
            store,
            config: Arc::new(config),
            guard: Arc::new(guard),
            limiter,
        }
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. Body limit
/// 3. Rate limiting (when `rate_limit > 0`)
/// 4. Push token check (when `push_token` is set)
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    match &state.limiter {
        Some(_) => tracing::info!("Rate limiting enabled: {} requests/second", server.rate_limit),
        None => tracing::info!("Rate limiting disabled"),
    }
    if state.guard.requires_token() {
        tracing::info!("Push token required");
    } else {
        tracing::warn!("Push token check DISABLED - set push_token or JOBINDEX_PUSH_TOKEN");
    }
    if !server.subscriptions.is_empty() {
        tracing::info!("Accepting pushes from {} subscriptions", server.subscriptions.len());
    }

    let max_body_bytes = server.max_body_bytes;
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/events", post(handlers::events_handler))
        .route("/pubsub", post(handlers::pubsub_handler))
        .route("/objects", get(handlers::objects_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::push_auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::extract::DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Resolve when the process receives Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining in-flight invocations");
}

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), IndexError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IndexError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("jobindex HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| IndexError::Io(format!("Server error: {}", e)))
}
