//! # Object Storage
//!
//! The storage collaborator seen by the indexer: read an object by
//! `(bucket, name)` and create an object only if nothing exists there yet.
//!
//! Two implementations ship with the crate:
//! - [`MemoryStore`]: volatile, for tests and embedding
//! - [`RedbStore`]: disk-backed, ACID, used by the server and CLI
//!
//! Publication always goes through [`ObjectStore::create_if_absent`]; no
//! code path in the indexer overwrites an existing object.

mod redb_store;

pub use redb_store::RedbStore;

use crate::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

// =============================================================================
// STORED OBJECT
// =============================================================================

/// Object bytes plus string metadata attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub metadata: BTreeMap<String, String>,
}

impl StoredObject {
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of a create-if-absent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The object did not exist and was written.
    Created,
    /// An object already existed; it is returned unchanged.
    Exists(StoredObject),
}

// =============================================================================
// OBJECT STORE TRAIT
// =============================================================================

/// Minimal object storage interface.
///
/// Implementations must make `create_if_absent` atomic with respect to
/// concurrent callers targeting the same name.
pub trait ObjectStore: Send + Sync {
    /// Fetch an object with its metadata, `None` when absent.
    fn stat(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, IndexError>;

    /// Write `object` unless `name` already exists in `bucket`.
    fn create_if_absent(
        &self,
        bucket: &str,
        name: &str,
        object: StoredObject,
    ) -> Result<WriteOutcome, IndexError>;

    /// Names in `bucket` starting with `prefix`, sorted.
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, IndexError>;

    /// Fetch object bytes; a missing object is an error.
    fn get(&self, bucket: &str, name: &str) -> Result<Vec<u8>, IndexError> {
        self.stat(bucket, name)?
            .map(|object| object.data)
            .ok_or_else(|| IndexError::NotFound {
                bucket: bucket.to_string(),
                name: name.to_string(),
            })
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory object store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> Result<MutexGuard<'_, BTreeMap<(String, String), StoredObject>>, IndexError> {
        self.objects
            .lock()
            .map_err(|_| IndexError::Io("memory store lock poisoned".to_string()))
    }

    /// Total number of objects across all buckets.
    pub fn len(&self) -> Result<usize, IndexError> {
        Ok(self.objects()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.objects()?.is_empty())
    }
}

impl ObjectStore for MemoryStore {
    fn stat(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, IndexError> {
        Ok(self
            .objects()?
            .get(&(bucket.to_string(), name.to_string()))
            .cloned())
    }

    fn create_if_absent(
        &self,
        bucket: &str,
        name: &str,
        object: StoredObject,
    ) -> Result<WriteOutcome, IndexError> {
        let mut objects = self.objects()?;
        let key = (bucket.to_string(), name.to_string());
        if let Some(existing) = objects.get(&key) {
            return Ok(WriteOutcome::Exists(existing.clone()));
        }
        objects.insert(key, object);
        Ok(WriteOutcome::Created)
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, IndexError> {
        Ok(self
            .objects()?
            .keys()
            .filter(|(b, name)| b == bucket && name.starts_with(prefix))
            .map(|(_, name)| name.clone())
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
