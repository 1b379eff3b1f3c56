//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jobindex_core::{ObjectChangeEvent, Outcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Pub/Sub attribute naming the notification type.
pub const EVENT_TYPE_ATTR: &str = "eventType";

/// The only notification type that carries a new object.
pub const OBJECT_FINALIZE: &str = "OBJECT_FINALIZE";

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of a failed non-indexing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// =============================================================================
// PUB/SUB PUSH ENVELOPE
// =============================================================================

/// Message of a Pub/Sub push request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64-encoded object resource JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Body of a Pub/Sub push request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PubSubPush {
    pub message: PubSubMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription: Option<String>,
}

impl PubSubPush {
    /// Extract the storage event.
    ///
    /// Returns `Ok(None)` for notification types other than object
    /// finalization. The event comes from `data` when present, otherwise
    /// from the `bucketId` / `objectId` attributes.
    pub fn event(&self) -> Result<Option<ObjectChangeEvent>, String> {
        let attributes = &self.message.attributes;
        if attributes
            .get(EVENT_TYPE_ATTR)
            .is_some_and(|kind| kind != OBJECT_FINALIZE)
        {
            return Ok(None);
        }

        match self.message.data.as_deref().filter(|d| !d.is_empty()) {
            Some(data) => {
                let raw = STANDARD
                    .decode(data)
                    .map_err(|e| format!("message data is not base64: {e}"))?;
                serde_json::from_slice(&raw)
                    .map(Some)
                    .map_err(|e| format!("message data is not an object resource: {e}"))
            }
            None => match (attributes.get("bucketId"), attributes.get("objectId")) {
                (Some(bucket), Some(name)) => {
                    Ok(Some(ObjectChangeEvent::new(bucket.as_str(), name.as_str())))
                }
                _ => Err("message has neither data nor bucketId/objectId attributes".to_string()),
            },
        }
    }
}

// =============================================================================
// INDEX RESPONSE
// =============================================================================

/// One published entry in JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryJson {
    pub kind: String,
    pub path: String,
    pub publication: String,
}

/// Result of one invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    /// `ignored`, `skipped`, `indexed` or `failed`.
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IndexResponse {
    #[must_use]
    pub fn from_outcome(outcome: &Outcome) -> Self {
        let reason = match outcome {
            Outcome::Skipped(reason) => Some(reason.as_str().to_string()),
            Outcome::Ignored | Outcome::Indexed(_) => None,
        };
        Self {
            outcome: outcome.as_str().to_string(),
            entries: outcome
                .published()
                .iter()
                .map(|p| EntryJson {
                    kind: p.kind.as_str().to_string(),
                    path: p.path.to_string(),
                    publication: p.publication.as_str().to_string(),
                })
                .collect(),
            reason,
            error: None,
        }
    }

    /// Acknowledge a notification that does not describe a new object.
    #[must_use]
    pub fn ignored() -> Self {
        Self::from_outcome(&Outcome::Ignored)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            outcome: "failed".to_string(),
            entries: Vec::new(),
            reason: None,
            error: Some(message.into()),
        }
    }
}

// =============================================================================
// LIST REQUEST/RESPONSE
// =============================================================================

/// Query string of `GET /objects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
}

/// Names stored under a prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub bucket: String,
    pub prefix: String,
    pub names: Vec<String>,
}

// =============================================================================
// TESTS
// =============================================================================
