//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Indexing handlers answer non-2xx whenever the invocation failed, so the
//! push subscription redelivers the notification.

use super::{
    AppState,
    types::{ErrorResponse, HealthResponse, IndexResponse, ListParams, ListResponse, PubSubPush},
};
use crate::sink::TracingSink;
use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use jobindex_core::{IndexError, Indexer, ObjectChangeEvent};
use std::sync::Arc;

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// EVENT HANDLERS
// =============================================================================

/// Index the object named by a storage notification.
pub async fn events_handler(
    State(state): State<AppState>,
    payload: Result<Json<ObjectChangeEvent>, JsonRejection>,
) -> impl IntoResponse {
    match payload {
        Ok(Json(event)) => run_invocation(&state, event).await,
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            Json(IndexResponse::error(format!(
                "Invalid event: {}",
                rejection.body_text()
            ))),
        ),
    }
}

/// Index the object named by a Pub/Sub push message.
pub async fn pubsub_handler(
    State(state): State<AppState>,
    payload: Result<Json<PubSubPush>, JsonRejection>,
) -> impl IntoResponse {
    let push = match payload {
        Ok(Json(push)) => push,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(IndexResponse::error(format!(
                    "Invalid push message: {}",
                    rejection.body_text()
                ))),
            );
        }
    };

    if !state.guard.admits_subscription(push.subscription.as_deref()) {
        tracing::warn!(
            event = "subscription_rejected",
            subscription = push.subscription.as_deref().unwrap_or("<none>"),
            "Push from a subscription outside the allowlist"
        );
        return (
            StatusCode::FORBIDDEN,
            Json(IndexResponse::error(format!(
                "Subscription {:?} is not allowed to push",
                push.subscription.as_deref().unwrap_or_default()
            ))),
        );
    }

    match push.event() {
        Ok(Some(event)) => run_invocation(&state, event).await,
        Ok(None) => (StatusCode::OK, Json(IndexResponse::ignored())),
        Err(reason) => (
            StatusCode::BAD_REQUEST,
            Json(IndexResponse::error(format!("Invalid push message: {}", reason))),
        ),
    }
}

/// Map an invocation error to the status reported to the pusher.
fn status_for(error: &IndexError) -> StatusCode {
    if error.is_transient() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match error {
        IndexError::NotFound { .. } => StatusCode::NOT_FOUND,
        IndexError::Decode { .. }
        | IndexError::Tuple(_)
        | IndexError::MissingRequiredMetric { .. }
        | IndexError::PublishConflict { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        IndexError::Io(_) | IndexError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Run one invocation on the blocking pool, bounded by the configured timeout.
async fn run_invocation(
    state: &AppState,
    event: ObjectChangeEvent,
) -> (StatusCode, Json<IndexResponse>) {
    let store = Arc::clone(&state.store);
    let config = Arc::clone(&state.config);
    let timeout = config.server.timeout();
    let uri = event.uri();

    let task = tokio::task::spawn_blocking(move || {
        Indexer::new(store.as_ref(), &TracingSink, &config.indexer).handle(&event)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(outcome))) => (StatusCode::OK, Json(IndexResponse::from_outcome(&outcome))),
        Ok(Ok(Err(e))) => {
            tracing::error!(event = "index_failed", object = %uri, "Failed to index {}: {}", uri, e);
            (status_for(&e), Json(IndexResponse::error(e.to_string())))
        }
        Ok(Err(e)) => {
            tracing::error!(event = "index_failed", object = %uri, "Invocation aborted: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(IndexResponse::error("Invocation aborted")),
            )
        }
        Err(_) => {
            tracing::error!(
                event = "index_timeout",
                object = %uri,
                "Invocation for {} timed out after {:?}",
                uri,
                timeout
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(IndexResponse::error(format!(
                    "Invocation timed out after {} seconds",
                    timeout.as_secs()
                ))),
            )
        }
    }
}

// =============================================================================
// OBJECTS HANDLER
// =============================================================================

/// List object names under a prefix.
pub async fn objects_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let store = Arc::clone(&state.store);
    let (bucket, prefix) = (params.bucket.clone(), params.prefix.clone());
    let listed = tokio::task::spawn_blocking(move || store.list(&bucket, &prefix)).await;

    match listed {
        Ok(Ok(names)) => Json(ListResponse {
            bucket: params.bucket,
            prefix: params.prefix,
            names,
        })
        .into_response(),
        Ok(Err(e)) => (status_for(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("List aborted: {}", e))),
        )
            .into_response(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_ask_for_redelivery() {
        let down = IndexError::Io("backend unavailable".to_string());
        assert_eq!(status_for(&down), StatusCode::SERVICE_UNAVAILABLE);

        let missing = IndexError::NotFound {
            bucket: "b".to_string(),
            name: "x".to_string(),
        };
        assert_eq!(status_for(&missing), StatusCode::NOT_FOUND);

        let conflict = IndexError::PublishConflict {
            path: "index/job-state/x".to_string(),
        };
        assert_eq!(status_for(&conflict), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status_for(&IndexError::Serialization("too big".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
