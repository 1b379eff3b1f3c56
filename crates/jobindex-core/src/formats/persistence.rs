//! # Persistence Format
//!
//! Binary encoding of objects held by the embedded store.
//!
//! Format: Header (5 bytes) + postcard-serialized [`StoredObject`].
//! - 4 bytes: Magic ("JIDX")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded.

use crate::IndexError;
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_OBJECT_SIZE};
use crate::storage::StoredObject;

/// Header length in bytes.
const HEADER_SIZE: usize = 5;

/// Upper bound on an encoded record: the object plus its metadata.
const MAX_RECORD_SIZE: usize = MAX_OBJECT_SIZE + 1024 * 1024;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header preceding every stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl RecordHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if &self.magic != MAGIC_BYTES {
            return Err(IndexError::Serialization("Invalid magic bytes".to_string()));
        }
        if self.version != FORMAT_VERSION {
            return Err(IndexError::Serialization(format!(
                "Unsupported version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        if bytes.len() < HEADER_SIZE {
            return Err(IndexError::Serialization("Header too short".to_string()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Encode an object as header + payload.
pub fn object_to_bytes(object: &StoredObject) -> Result<Vec<u8>, IndexError> {
    if object.data.len() > MAX_OBJECT_SIZE {
        return Err(IndexError::Serialization(format!(
            "Object size {} bytes exceeds maximum allowed {} bytes",
            object.data.len(),
            MAX_OBJECT_SIZE
        )));
    }

    let payload =
        postcard::to_stdvec(object).map_err(|e| IndexError::Serialization(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&RecordHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Decode an object written by [`object_to_bytes`].
pub fn object_from_bytes(bytes: &[u8]) -> Result<StoredObject, IndexError> {
    if bytes.len() < HEADER_SIZE {
        return Err(IndexError::Serialization(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(IndexError::Serialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_RECORD_SIZE
        )));
    }

    RecordHeader::from_bytes(bytes)?.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        IndexError::Serialization(format!("Failed to deserialize stored object: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================
