//! # redb-backed Object Store
//!
//! A disk-backed [`ObjectStore`] using the redb embedded database:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Objects live in one table keyed by `(bucket, name)`. The existence check
//! and the insert of `create_if_absent` run inside a single write
//! transaction, and redb admits one writer at a time, so two invocations
//! racing for the same index entry cannot both create it.

use super::{ObjectStore, StoredObject, WriteOutcome};
use crate::IndexError;
use crate::formats::{object_from_bytes, object_to_bytes};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::fmt::Display;
use std::path::Path;

/// Table for objects: (bucket, name) -> encoded StoredObject
const OBJECTS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("objects");

fn io_error(e: impl Display) -> IndexError {
    IndexError::Io(e.to_string())
}

/// A disk-backed object store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        // Initialize the table if it doesn't exist
        {
            let write_txn = db.begin_write().map_err(io_error)?;
            let _ = write_txn.open_table(OBJECTS).map_err(io_error)?;
            write_txn.commit().map_err(io_error)?;
        }

        Ok(Self { db })
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> Result<u64, IndexError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(OBJECTS).map_err(io_error)?;
        table.len().map_err(io_error)
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len()? == 0)
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), IndexError> {
        self.db.compact().map_err(io_error)?;
        Ok(())
    }
}

impl ObjectStore for RedbStore {
    fn stat(&self, bucket: &str, name: &str) -> Result<Option<StoredObject>, IndexError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(OBJECTS).map_err(io_error)?;
        let entry = table.get((bucket, name)).map_err(io_error)?;
        entry.map(|data| object_from_bytes(data.value())).transpose()
    }

    fn create_if_absent(
        &self,
        bucket: &str,
        name: &str,
        object: StoredObject,
    ) -> Result<WriteOutcome, IndexError> {
        // Encode before the transaction opens; oversized objects never touch the file.
        let bytes = object_to_bytes(&object)?;

        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut table = write_txn.open_table(OBJECTS).map_err(io_error)?;
            let existing = table
                .get((bucket, name))
                .map_err(io_error)?
                .map(|data| object_from_bytes(data.value()))
                .transpose()?;
            if let Some(existing) = existing {
                drop(table);
                write_txn.abort().map_err(io_error)?;
                return Ok(WriteOutcome::Exists(existing));
            }
            table
                .insert((bucket, name), bytes.as_slice())
                .map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;
        Ok(WriteOutcome::Created)
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, IndexError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(OBJECTS).map_err(io_error)?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(io_error)? {
            let (key, _) = entry.map_err(io_error)?;
            let (b, name) = key.value();
            if b == bucket && name.starts_with(prefix) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

// =============================================================================
// TESTS
// =============================================================================
