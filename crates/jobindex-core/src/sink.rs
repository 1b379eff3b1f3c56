//! # Event Sink
//!
//! Structured diagnostics emitted while indexing.
//!
//! The core never logs directly. Components receive an [`EventSink`] and
//! report what they did; the app forwards events to `tracing`, tests collect
//! them with [`MemorySink`].

use crate::{IndexKind, IndexPath};
use std::sync::Mutex;

/// Severity an event should be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
}

/// Why an event produced no index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The object path has too few segments to name a job and build.
    ShortPath,
    /// The metrics dump is not under the configured log root.
    OutsideLogRoot,
    /// The job name matches no accepted prefix.
    UnlistedJob,
    /// The completion marker has no completion time yet.
    Pending,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ShortPath => "short_path",
            Self::OutsideLogRoot => "outside_log_root",
            Self::UnlistedJob => "unlisted_job",
            Self::Pending => "pending",
        }
    }
}

/// Something worth reporting during an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// A relevant object was left alone.
    Skipped { object: String, reason: SkipReason },
    /// A series lacked the representative label of its query.
    SeriesDropped {
        query: String,
        index: usize,
        label: String,
    },
    /// A query returned several series and none of them carried labels.
    UnlabeledQuery { query: String, series: usize },
    /// A new index entry was written.
    Published {
        kind: IndexKind,
        path: IndexPath,
        link: String,
        bytes: usize,
    },
    /// The entry already existed with identical content.
    AlreadyIndexed { kind: IndexKind, path: IndexPath },
}

impl IndexEvent {
    #[must_use]
    pub const fn level(&self) -> EventLevel {
        match self {
            Self::Skipped { .. } => EventLevel::Debug,
            Self::Published { .. } | Self::AlreadyIndexed { .. } => EventLevel::Info,
            Self::SeriesDropped { .. } | Self::UnlabeledQuery { .. } => EventLevel::Warn,
        }
    }
}

/// Receiver of [`IndexEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: IndexEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: IndexEvent) {}
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<IndexEvent>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<IndexEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recorded events at `level` or above.
    #[must_use]
    pub fn at_least(&self, level: EventLevel) -> Vec<IndexEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level() >= level)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: IndexEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}
