//! # Indexer
//!
//! Entry point of one invocation: takes an [`ObjectChangeEvent`] and turns
//! the changed object into zero or more published index entries.
//!
//! Dispatch is by the base name of the object:
//! - `finished.json`: completion marker, publishes a `job-state` entry
//!   (and a `job-failures` entry for unsuccessful jobs when enabled)
//! - `job_metrics.json`: metrics dump, publishes a `job-metrics` entry
//! - anything else: ignored
//!
//! An invocation is synchronous and holds no state between calls. Skipped
//! work is reported through the sink and returned as [`Outcome::Skipped`],
//! never as an error.

use crate::completion::{Classifier, Completion, completion_time};
use crate::consolidate::{Consolidator, MetricsDocument};
use crate::index_key::{MarkerSource, MetricsSource};
use crate::primitives::{FINISHED_MARKER, METRICS_DUMP};
use crate::sink::{EventSink, IndexEvent, SkipReason};
use crate::storage::ObjectStore;
use crate::writer::{ATTR_COMPLETED, ATTR_STATE, IndexEntry, IndexWriter, Publication};
use crate::{
    IndexError, IndexKind, IndexPath, IndexerConfig, JobState, JobStateRecord, ObjectChangeEvent,
};
use serde::Serialize;

// =============================================================================
// OUTCOME
// =============================================================================

/// One entry written (or found already written) by an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Published {
    pub kind: IndexKind,
    pub path: IndexPath,
    pub publication: Publication,
}

/// Result of a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The object is not an artifact the indexer reads.
    Ignored,
    /// The object is an artifact but nothing was published for it.
    Skipped(SkipReason),
    /// Entries published, in publication order.
    Indexed(Vec<Published>),
}

impl Outcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Skipped(_) => "skipped",
            Self::Indexed(_) => "indexed",
        }
    }

    /// Entries touched by the invocation; empty unless indexed.
    #[must_use]
    pub fn published(&self) -> &[Published] {
        match self {
            Self::Indexed(entries) => entries,
            Self::Ignored | Self::Skipped(_) => &[],
        }
    }
}

// =============================================================================
// INDEXER
// =============================================================================

/// Handles storage events against one store.
pub struct Indexer<'a> {
    store: &'a dyn ObjectStore,
    sink: &'a dyn EventSink,
    config: &'a IndexerConfig,
}

impl<'a> Indexer<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn ObjectStore,
        sink: &'a dyn EventSink,
        config: &'a IndexerConfig,
    ) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    /// Run one invocation for `event`.
    pub fn handle(&self, event: &ObjectChangeEvent) -> Result<Outcome, IndexError> {
        match event.base_name() {
            FINISHED_MARKER => self.index_completion(event),
            METRICS_DUMP => self.index_metrics(event),
            _ => Ok(Outcome::Ignored),
        }
    }

    fn skip(&self, event: &ObjectChangeEvent, reason: SkipReason) -> Outcome {
        self.sink.emit(IndexEvent::Skipped {
            object: event.uri(),
            reason,
        });
        Outcome::Skipped(reason)
    }

    fn writer<'b>(&'b self, bucket: &'b str) -> IndexWriter<'b> {
        IndexWriter::new(self.store, self.sink, bucket)
    }

    fn index_completion(&self, event: &ObjectChangeEvent) -> Result<Outcome, IndexError> {
        let Some(source) = MarkerSource::parse(&event.name) else {
            return Ok(self.skip(event, SkipReason::ShortPath));
        };

        let raw = self.store.get(&event.bucket, &event.name)?;
        let uri = event.uri();
        let record = Classifier::decode(&raw).map_err(|e| e.within(&uri))?;
        let completion = Classifier::classify(&record).map_err(|e| e.within(&uri))?;
        let (state, completed_at) = match completion {
            Completion::Pending => return Ok(self.skip(event, SkipReason::Pending)),
            Completion::Finished {
                state,
                completed_at,
            } => (state, completed_at),
        };

        let link = source.link(&event.bucket);
        let completed = completed_at.timestamp();
        let writer = self.writer(&event.bucket);
        let mut published = Vec::new();

        let path = IndexPath::new(IndexKind::JobState, completed_at, source.job(), source.build());
        let body = JobStateRecord {
            state,
            completed_at: completed,
            link: link.clone(),
        };
        let entry = IndexEntry::json(IndexKind::JobState, path.clone(), &body, link.as_str())?
            .with_attr(ATTR_STATE, state.as_str())
            .with_attr(ATTR_COMPLETED, completed.to_string());
        published.push(Published {
            kind: IndexKind::JobState,
            path,
            publication: writer.publish(entry)?,
        });

        if self.config.index_failures && state != JobState::Success {
            let path = IndexPath::new(
                IndexKind::JobFailures,
                completed_at,
                source.job(),
                source.build(),
            );
            let entry = IndexEntry::new(IndexKind::JobFailures, path.clone(), raw, link);
            published.push(Published {
                kind: IndexKind::JobFailures,
                path,
                publication: writer.publish(entry)?,
            });
        }

        Ok(Outcome::Indexed(published))
    }

    fn index_metrics(&self, event: &ObjectChangeEvent) -> Result<Outcome, IndexError> {
        let source = match MetricsSource::resolve(self.config, &event.bucket, &event.name) {
            Ok(source) => source,
            Err(reason) => return Ok(self.skip(event, reason)),
        };

        let raw = self.store.get(&event.bucket, &event.name)?;
        let document = MetricsDocument::decode(&raw).map_err(|e| e.within(&event.uri()))?;
        let metrics = Consolidator::new(self.sink)
            .consolidate_required(&document, &self.config.required_metric)?;

        // The required metric's sample time anchors the shard key.
        let completed = metrics.require(&self.config.required_metric)?.timestamp;
        let completed_at = completion_time(completed)?;

        let path = IndexPath::new(IndexKind::JobMetrics, completed_at, &source.job, &source.build);
        let entry = IndexEntry::new(
            IndexKind::JobMetrics,
            path.clone(),
            metrics.to_json()?,
            source.link,
        )
        .with_attr(ATTR_COMPLETED, completed.to_string());
        let publication = self.writer(&event.bucket).publish(entry)?;

        Ok(Outcome::Indexed(vec![Published {
            kind: IndexKind::JobMetrics,
            path,
            publication,
        }]))
    }
}

// =============================================================================
// TESTS
// =============================================================================
