//! # jobindex-core
//!
//! The index publication engine for CI job artifacts - THE LOGIC.
//!
//! Given one changed storage object, this crate decodes it, condenses it
//! into a compact record, and publishes that record at most once under a
//! date-sharded key:
//!
//! ```text
//! finished.json    -> Classifier   -> index/job-state/<RFC3339>/<job>/<build>
//! job_metrics.json -> Consolidator -> index/job-metrics/<RFC3339>/<job>/<build>
//! ```
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is synchronous and holds no state between invocations
//! - Publishes only through create-if-absent writes, never overwrites
//! - Uses ordered maps only, so output bytes are reproducible
//! - Reports diagnostics through an injected [`EventSink`], never a global logger
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod completion;
pub mod config;
pub mod consolidate;
pub mod formats;
pub mod index_key;
pub mod indexer;
pub mod labels;
pub mod primitives;
pub mod sink;
pub mod storage;
pub mod tuple;
pub mod types;
pub mod writer;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{IndexError, JobState, JobStateRecord, ObjectChangeEvent, OutputMetric};

// =============================================================================
// RE-EXPORTS: Decoders
// =============================================================================

pub use completion::{Classifier, Completion, CompletionRecord, Metadata};
pub use labels::LabelSet;
pub use tuple::{ParseState, TupleError, TupleValue};

// =============================================================================
// RE-EXPORTS: Index Engine
// =============================================================================

pub use config::IndexerConfig;
pub use consolidate::{Consolidator, MetricSet, MetricsDocument, composite_key};
pub use index_key::{IndexKind, IndexPath, MarkerSource, MetricsSource, shard_key};
pub use indexer::{Indexer, Outcome, Published};
pub use sink::{EventLevel, EventSink, IndexEvent, MemorySink, NullSink, SkipReason};
pub use writer::{IndexEntry, IndexWriter, Publication};

// =============================================================================
// RE-EXPORTS: Storage (from storage and formats modules)
// =============================================================================

pub use formats::{RecordHeader, object_from_bytes, object_to_bytes};
pub use storage::{MemoryStore, ObjectStore, RedbStore, StoredObject, WriteOutcome};
