//! # Formats Module
//!
//! Binary record layout of the embedded object store.

pub mod persistence;

pub use persistence::{RecordHeader, object_from_bytes, object_to_bytes};
