//! # Index Writer
//!
//! Publishes one index entry through [`ObjectStore::create_if_absent`].
//!
//! An entry is never overwritten. When the target already exists:
//! - identical bytes: the publish is a successful no-op ([`Publication::AlreadyIndexed`])
//! - different bytes: [`IndexError::PublishConflict`]

use crate::sink::{EventSink, IndexEvent};
use crate::storage::{ObjectStore, StoredObject, WriteOutcome};
use crate::{IndexError, IndexKind, IndexPath};
use serde::Serialize;
use std::collections::BTreeMap;

/// Metadata attribute pointing back at the source directory.
pub const ATTR_LINK: &str = "link";
/// Metadata attribute carrying the job state.
pub const ATTR_STATE: &str = "state";
/// Metadata attribute carrying the completion time in epoch seconds.
pub const ATTR_COMPLETED: &str = "completed";

// =============================================================================
// INDEX ENTRY
// =============================================================================

/// A serialized record ready for publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: IndexKind,
    pub path: IndexPath,
    pub body: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
}

impl IndexEntry {
    /// Create an entry whose `link` attribute is `link`.
    #[must_use]
    pub fn new(kind: IndexKind, path: IndexPath, body: Vec<u8>, link: impl Into<String>) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(ATTR_LINK.to_string(), link.into());
        Self {
            kind,
            path,
            body,
            attributes,
        }
    }

    /// Create an entry from a record serialized as JSON.
    pub fn json<T: Serialize>(
        kind: IndexKind,
        path: IndexPath,
        record: &T,
        link: impl Into<String>,
    ) -> Result<Self, IndexError> {
        let body = serde_json::to_vec(record).map_err(|e| {
            IndexError::Serialization(format!("could not serialize {kind} record: {e}"))
        })?;
        Ok(Self::new(kind, path, body, link))
    }

    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The `link` attribute.
    #[must_use]
    pub fn link(&self) -> &str {
        self.attributes.get(ATTR_LINK).map_or("", String::as_str)
    }
}

// =============================================================================
// PUBLICATION
// =============================================================================

/// How a successful publish ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Publication {
    /// The entry was written by this call.
    Created,
    /// An identical entry was already present.
    AlreadyIndexed,
}

impl Publication {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AlreadyIndexed => "already-indexed",
        }
    }
}

/// Writes index entries into one bucket.
pub struct IndexWriter<'a> {
    store: &'a dyn ObjectStore,
    sink: &'a dyn EventSink,
    bucket: &'a str,
}

impl<'a> IndexWriter<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ObjectStore, sink: &'a dyn EventSink, bucket: &'a str) -> Self {
        Self {
            store,
            sink,
            bucket,
        }
    }

    /// Create `entry` unless it exists; see the module docs for the
    /// already-exists rules.
    pub fn publish(&self, entry: IndexEntry) -> Result<Publication, IndexError> {
        let link = entry.link().to_string();
        let bytes = entry.body.len();
        let object = StoredObject {
            data: entry.body.clone(),
            metadata: entry.attributes,
        };

        match self
            .store
            .create_if_absent(self.bucket, entry.path.as_str(), object)?
        {
            WriteOutcome::Created => {
                self.sink.emit(IndexEvent::Published {
                    kind: entry.kind,
                    path: entry.path,
                    link,
                    bytes,
                });
                Ok(Publication::Created)
            }
            WriteOutcome::Exists(existing) if existing.data == entry.body => {
                self.sink.emit(IndexEvent::AlreadyIndexed {
                    kind: entry.kind,
                    path: entry.path,
                });
                Ok(Publication::AlreadyIndexed)
            }
            WriteOutcome::Exists(_) => Err(IndexError::PublishConflict {
                path: entry.path.to_string(),
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
