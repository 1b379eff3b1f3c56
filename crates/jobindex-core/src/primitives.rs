//! # Primitives
//!
//! Fixed names and limits for the indexer.
//!
//! These values are compiled into the binary. The ones that operators are
//! expected to change (log root, job prefixes, required metric) are only
//! defaults for [`crate::IndexerConfig`].

// =============================================================================
// SOURCE OBJECTS
// =============================================================================

/// Base name of the completion marker written when a job finishes.
pub const FINISHED_MARKER: &str = "finished.json";

/// Base name of the time-series query dump gathered by a job.
pub const METRICS_DUMP: &str = "job_metrics.json";

/// Minimum number of slash-delimited segments a source path needs before
/// job and build can be extracted from it.
pub const MIN_PATH_SEGMENTS: usize = 4;

/// Default first path segment of job logs eligible for metrics indexing.
pub const DEFAULT_LOG_ROOT: &str = "logs";

/// Default job name prefixes eligible for metrics indexing.
pub const DEFAULT_JOB_PREFIXES: &[&str] = &["periodic-ci-openshift-release-", "release-openshift-"];

/// Metric that must be present in every consolidated metrics record.
///
/// Its sample timestamp is the completion time used for the shard key.
pub const REQUIRED_METRIC: &str = "job:duration:total:seconds";

// =============================================================================
// INDEX NAMESPACE
// =============================================================================

/// Root prefix of all published index entries.
pub const INDEX_ROOT: &str = "index";

/// URI scheme used for links back to source objects.
pub const LINK_SCHEME: &str = "gs";

/// Query status accepted by the consolidator.
pub const SUCCESS_STATUS: &str = "success";

/// Query result type accepted by the consolidator.
pub const VECTOR_RESULT: &str = "vector";

// =============================================================================
// STORED OBJECT FORMAT
// =============================================================================

/// Magic bytes heading every object record in the embedded store.
pub const MAGIC_BYTES: &[u8; 4] = b"JIDX";

/// Current stored object format version.
///
/// Increment this when making breaking changes to the record layout.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum size of a single stored object (64 MB).
///
/// Metrics dumps from large jobs stay well below this; anything bigger is
/// rejected before it is decoded.
pub const MAX_OBJECT_SIZE: usize = 64 * 1024 * 1024;

/// Number of bytes of raw input quoted in decode error messages.
pub const ERROR_SNIPPET_LENGTH: usize = 64;
