//! # Push Authentication
//!
//! A push subscription is configured with a shared token and sends it on
//! every delivery, either as a header or in the endpoint URL:
//!
//! ```text
//! Authorization: Bearer <push_token>
//! POST /pubsub?token=<push_token>
//! ```
//!
//! Pub/Sub deliveries are additionally matched against the configured
//! subscription allowlist. `/health` never needs a token.

use super::{AppState, types::ErrorResponse};
use crate::config::ServerConfig;
use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::collections::BTreeSet;
use subtle::ConstantTimeEq;

/// Query parameters that may carry the push token.
#[derive(Debug, Default, Deserialize)]
struct TokenParams {
    token: Option<String>,
}

/// Where a presented token came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Header,
    Query,
}

// =============================================================================
// PUSH GUARD
// =============================================================================

/// Admission rules for push deliveries.
#[derive(Debug, Clone, Default)]
pub struct PushGuard {
    token: Option<String>,
    subscriptions: BTreeSet<String>,
}

impl PushGuard {
    #[must_use]
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            token: server.push_token.clone().filter(|t| !t.is_empty()),
            subscriptions: server.subscriptions.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn requires_token(&self) -> bool {
        self.token.is_some()
    }

    /// Whether `presented` matches the configured token.
    ///
    /// Always true when no token is configured.
    #[must_use]
    pub fn accepts_token(&self, presented: Option<&str>) -> bool {
        match (&self.token, presented) {
            (None, _) => true,
            (Some(_), None) => false,
            // Slice ct_eq compares lengths first; only the content is secret.
            (Some(expected), Some(presented)) => {
                presented.as_bytes().ct_eq(expected.as_bytes()).into()
            }
        }
    }

    /// Whether a Pub/Sub delivery from `subscription` may be indexed.
    ///
    /// An empty allowlist admits every delivery, including ones that name no
    /// subscription.
    #[must_use]
    pub fn admits_subscription(&self, subscription: Option<&str>) -> bool {
        self.subscriptions.is_empty()
            || subscription.is_some_and(|s| self.subscriptions.contains(s))
    }
}

/// Extract the push token from the request, header first.
fn presented_token(request: &Request<Body>) -> Option<(String, TokenSource)> {
    let from_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| (t.trim().to_string(), TokenSource::Header));

    from_header.or_else(|| {
        Query::<TokenParams>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(params)| params.token)
            .map(|t| (t, TokenSource::Query))
    })
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Reject deliveries without the configured push token with 401.
pub async fn push_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.guard.requires_token() || request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let presented = presented_token(&request);
    if state
        .guard
        .accepts_token(presented.as_ref().map(|(token, _)| token.as_str()))
    {
        return next.run(request).await;
    }

    let reason = match presented {
        Some((_, TokenSource::Header)) => "invalid_bearer_token",
        Some((_, TokenSource::Query)) => "invalid_query_token",
        None => "missing_token",
    };
    tracing::warn!(
        event = "auth_failure",
        reason,
        path = %request.uri().path(),
        "Rejected push delivery"
    );
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("missing or invalid push token")),
    )
        .into_response()
}

// =============================================================================
// TESTS
// =============================================================================
