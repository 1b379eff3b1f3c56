//! # Core Type Definitions
//!
//! This module contains the types shared by every stage of an invocation:
//! - The incoming storage notification (`ObjectChangeEvent`)
//! - Published records (`JobState`, `JobStateRecord`, `OutputMetric`)
//! - Error types (`IndexError`)
//!
//! Every value here is built fresh per invocation and dropped at its end.

use crate::tuple::{TupleError, TupleValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// OBJECT CHANGE EVENT
// =============================================================================

/// Notification that an object in a bucket was created or replaced.
///
/// Only `bucket` and `name` drive indexing. The remaining fields mirror the
/// storage notification payload and are carried for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChangeEvent {
    pub bucket: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

impl ObjectChangeEvent {
    /// Create an event for `bucket` / `name` with no descriptive fields.
    #[must_use]
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            kind: None,
            id: None,
            content_type: None,
            size: None,
            md5_hash: None,
            metadata: None,
        }
    }

    /// Last slash-delimited segment of the object name.
    #[must_use]
    pub fn base_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// Storage URI of the changed object.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("{}://{}/{}", crate::primitives::LINK_SCHEME, self.bucket, self.name)
    }
}

// =============================================================================
// JOB STATE
// =============================================================================

/// Final state of a job as recorded in its completion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Success,
    Failed,
    /// The marker carried no pass/fail verdict.
    Error,
}

impl JobState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }

    /// Map the marker's optional `passed` flag to a state.
    #[must_use]
    pub const fn from_passed(passed: Option<bool>) -> Self {
        match passed {
            None => Self::Error,
            Some(true) => Self::Success,
            Some(false) => Self::Failed,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a `job-state` index entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStateRecord {
    pub state: JobState,
    /// Completion time in UTC epoch seconds.
    pub completed_at: i64,
    /// Storage URI of the directory holding the job's artifacts.
    pub link: String,
}

// =============================================================================
// OUTPUT METRIC
// =============================================================================

/// A single flattened sample in a `job-metrics` index entry.
///
/// The value keeps the exact decimal text of the source sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputMetric {
    pub timestamp: i64,
    pub value: String,
}

impl From<&TupleValue> for OutputMetric {
    fn from(tuple: &TupleValue) -> Self {
        Self {
            timestamp: tuple.timestamp,
            value: tuple.value.clone(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that fail an invocation.
///
/// Skipped work (unrelated files, short paths, pending jobs, out-of-scope
/// jobs) is never an error; see [`crate::Outcome`].
#[derive(Debug, Error)]
pub enum IndexError {
    /// Reading from or writing to the object store failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The object named by an event does not exist (any more).
    #[error("object not found: gs://{bucket}/{name}")]
    NotFound { bucket: String, name: String },

    /// A source object could not be decoded.
    #[error("could not decode {context}: {reason}")]
    Decode { context: String, reason: String },

    /// A sample value did not follow the `[<int>, "<number>"]` form.
    #[error(transparent)]
    Tuple(#[from] TupleError),

    /// The consolidated metrics lack the metric that anchors the shard key.
    #[error("job not indexed, does not have metric {metric:?}")]
    MissingRequiredMetric { metric: String },

    /// An index entry already exists at the path with different content.
    #[error("index entry {path} already exists with different content")]
    PublishConflict { path: String },

    /// A record could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl IndexError {
    /// Qualify a decode error with the storage URI of the object it came from.
    #[must_use]
    pub fn within(self, uri: &str) -> Self {
        match self {
            Self::Decode { context, reason } => Self::Decode {
                context: format!("{context} {uri}"),
                reason,
            },
            other => other,
        }
    }

    /// Whether the failure came from the storage collaborator rather than
    /// from the content being indexed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================
