//! # Index Key Builder
//!
//! Derives where an index entry is published:
//!
//! ```text
//! index/<kind>/<RFC3339 UTC, second precision>/<job>/<build>
//! ```
//!
//! The path depends only on its four inputs, so re-delivering the same
//! source object always targets the same entry.

use crate::IndexerConfig;
use crate::primitives::{INDEX_ROOT, LINK_SCHEME, MIN_PATH_SEGMENTS};
use crate::sink::SkipReason;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// INDEX KIND
// =============================================================================

/// Family of index entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKind {
    JobState,
    JobFailures,
    JobMetrics,
}

impl IndexKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JobState => "job-state",
            Self::JobFailures => "job-failures",
            Self::JobMetrics => "job-metrics",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SLASH PATHS
// =============================================================================

/// Lexically normalize a slash-separated object path: repeated slashes
/// collapse, `.` segments vanish, and `..` removes the segment before it.
/// An empty result is `"."`.
#[must_use]
pub fn clean_path(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join the non-empty `parts` with `/` and normalize the result; empty when
/// every part is empty.
#[must_use]
pub fn join_path(parts: &[&str]) -> String {
    let kept: Vec<&str> = parts.iter().copied().filter(|p| !p.is_empty()).collect();
    if kept.is_empty() {
        return String::new();
    }
    clean_path(&kept.join("/"))
}

/// Normalized directory part of `path`.
#[must_use]
pub fn parent_path(path: &str) -> String {
    clean_path(path.rfind('/').map_or("", |i| &path[..=i]))
}

/// Percent-encode `path` for the path component of a URI. Unreserved
/// characters, `/` and the sub-delimiters `$&+,:;=@` stay literal.
fn escape_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for &byte in path.as_bytes() {
        if byte.is_ascii_alphanumeric()
            || matches!(
                byte,
                b'-' | b'_' | b'.' | b'~' | b'/' | b'$' | b'&' | b'+' | b',' | b':' | b';' | b'=' | b'@'
            )
        {
            escaped.push(char::from(byte));
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

// =============================================================================
// INDEX PATH
// =============================================================================

/// Shard segment for a completion time: `2021-05-03T00:00:00Z`.
#[must_use]
pub fn shard_key(completed_at: DateTime<Utc>) -> String {
    completed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Object name of an index entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexPath(String);

impl IndexPath {
    /// `index/<kind>/<shard>/<job>/<build>`, normalized; an empty `job` or
    /// `build` contributes no segment.
    #[must_use]
    pub fn new(kind: IndexKind, completed_at: DateTime<Utc>, job: &str, build: &str) -> Self {
        let shard = shard_key(completed_at);
        Self(join_path(&[INDEX_ROOT, kind.as_str(), &shard, job, build]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage URI for `path` inside `bucket`, with the path percent-encoded.
#[must_use]
pub fn storage_link(bucket: &str, path: &str) -> String {
    let escaped = escape_path(path);
    let separator = if escaped.is_empty() || escaped.starts_with('/') {
        ""
    } else {
        "/"
    };
    format!("{LINK_SCHEME}://{bucket}{separator}{escaped}")
}

// =============================================================================
// SOURCE PATHS
// =============================================================================

/// Location of a completion marker, addressed from the end of its path:
/// `.../<job>/<build>/finished.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSource<'a> {
    name: &'a str,
    job: &'a str,
    build: &'a str,
}

impl<'a> MarkerSource<'a> {
    /// Split `name`; `None` when it has fewer than four segments.
    #[must_use]
    pub fn parse(name: &'a str) -> Option<Self> {
        let segments: Vec<&str> = name.split('/').collect();
        if segments.len() < MIN_PATH_SEGMENTS {
            return None;
        }
        let n = segments.len();
        Some(Self {
            name,
            job: segments[n - 3],
            build: segments[n - 2],
        })
    }

    #[must_use]
    pub const fn job(&self) -> &'a str {
        self.job
    }

    #[must_use]
    pub const fn build(&self) -> &'a str {
        self.build
    }

    /// Normalized directory holding the marker.
    #[must_use]
    pub fn dir(&self) -> String {
        parent_path(self.name)
    }

    #[must_use]
    pub fn link(&self, bucket: &str) -> String {
        storage_link(bucket, &self.dir())
    }
}

/// Location of an in-scope metrics dump, addressed from the start of its
/// path: `<log root>/<job>/<build>/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSource {
    pub job: String,
    pub build: String,
    /// Storage URI of `<log root>/<job>/<build>`.
    pub link: String,
}

impl MetricsSource {
    /// Resolve `bucket` / `name` against the configured scope.
    pub fn resolve(config: &IndexerConfig, bucket: &str, name: &str) -> Result<Self, SkipReason> {
        let segments: Vec<&str> = name.split('/').collect();
        if segments.len() < MIN_PATH_SEGMENTS {
            return Err(SkipReason::ShortPath);
        }
        if segments[0] != config.log_root {
            return Err(SkipReason::OutsideLogRoot);
        }
        let (job, build) = (segments[1], segments[2]);
        if !config.accepts_job(job) {
            return Err(SkipReason::UnlistedJob);
        }
        Ok(Self {
            job: job.to_string(),
            build: build.to_string(),
            link: storage_link(bucket, &join_path(&segments[..3])),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
