//! # Indexer Configuration
//!
//! Scope and naming knobs for an invocation. Every field has a default, so
//! an empty TOML table (or no file at all) yields the standard behavior.

use crate::primitives::{DEFAULT_JOB_PREFIXES, DEFAULT_LOG_ROOT, REQUIRED_METRIC};
use serde::{Deserialize, Serialize};

/// Settings shared by every invocation of the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// First path segment a metrics dump must live under.
    pub log_root: String,
    /// Job name prefixes whose metrics dumps are indexed.
    pub job_prefixes: Vec<String>,
    /// Metric whose presence gates publication of a metrics record.
    pub required_metric: String,
    /// Also publish the raw marker of unsuccessful jobs under `job-failures`.
    pub index_failures: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            log_root: DEFAULT_LOG_ROOT.to_string(),
            job_prefixes: DEFAULT_JOB_PREFIXES.iter().map(|p| p.to_string()).collect(),
            required_metric: REQUIRED_METRIC.to_string(),
            index_failures: false,
        }
    }
}

impl IndexerConfig {
    /// Whether metrics of `job` are in scope.
    #[must_use]
    pub fn accepts_job(&self, job: &str) -> bool {
        self.job_prefixes.iter().any(|p| job.starts_with(p.as_str()))
    }
}
