//! # Completion Classifier
//!
//! Decodes the `finished.json` marker a job writes when it ends and turns it
//! into a job state and completion time.
//!
//! A marker without a timestamp (or with a zero timestamp) belongs to a job
//! that is still running. That is not an error: the classifier reports
//! [`Completion::Pending`] and the caller does nothing.

use crate::{IndexError, JobState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// METADATA
// =============================================================================

/// Free-form values computed by the job at runtime.
///
/// Values are either strings or nested objects of the same shape. Well-known
/// keys include `repo`, `repos`, `repo-commit`, `infra-commit` and `links`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Look up a string entry.
    ///
    /// Returns `None` when the key is absent and `Some(None)` when it is
    /// present but not a string.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<Option<&str>> {
        self.0.get(name).map(Value::as_str)
    }

    /// Look up a nested metadata object.
    ///
    /// Returns `None` when the key is absent and `Some(None)` when it is
    /// present but not an object.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<Option<Self>> {
        self.0
            .get(name)
            .map(|v| v.as_object().map(|m| Self(m.clone())))
    }

    /// Every key present at this level, sorted, whatever its value.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// The top-level entries whose values are strings.
    #[must_use]
    pub fn strings(&self) -> std::collections::BTreeMap<&str, &str> {
        self.0
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.as_str(), s)))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(
            Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default(),
        ))
    }
}

// =============================================================================
// COMPLETION RECORD
// =============================================================================

/// The decoded `finished.json` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// UTC epoch seconds when the job finished. Absent while running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// `true` when the job completed successfully.
    #[serde(default)]
    pub passed: Option<bool>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Classification of a completion marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The job has not finished yet.
    Pending,
    Finished {
        state: JobState,
        completed_at: DateTime<Utc>,
    },
}

// =============================================================================
// CLASSIFIER
// =============================================================================

/// Turns completion marker bytes into a [`Completion`].
pub struct Classifier;

impl Classifier {
    /// Decode marker bytes.
    pub fn decode(raw: &[u8]) -> Result<CompletionRecord, IndexError> {
        serde_json::from_slice(raw).map_err(|e| IndexError::Decode {
            context: "completion marker".to_string(),
            reason: e.to_string(),
        })
    }

    /// Derive state and completion time from a decoded marker.
    pub fn classify(record: &CompletionRecord) -> Result<Completion, IndexError> {
        let timestamp = match record.timestamp {
            None | Some(0) => return Ok(Completion::Pending),
            Some(ts) => ts,
        };

        let completed_at = completion_time(timestamp)?;
        Ok(Completion::Finished {
            state: JobState::from_passed(record.passed),
            completed_at,
        })
    }

    /// Decode and classify in one step.
    pub fn classify_bytes(raw: &[u8]) -> Result<Completion, IndexError> {
        Self::classify(&Self::decode(raw)?)
    }
}

/// Interpret epoch seconds as a UTC instant.
pub fn completion_time(timestamp: i64) -> Result<DateTime<Utc>, IndexError> {
    DateTime::from_timestamp(timestamp, 0).ok_or_else(|| IndexError::Decode {
        context: "completion time".to_string(),
        reason: format!("timestamp {timestamp} is out of range"),
    })
}

// =============================================================================
// TESTS
// =============================================================================
