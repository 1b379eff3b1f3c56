//! # Tracing Sink
//!
//! Forwards core [`IndexEvent`]s to `tracing` as structured events.

use jobindex_core::{EventSink, IndexEvent};

/// [`EventSink`] writing every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: IndexEvent) {
        match event {
            IndexEvent::Skipped { object, reason } => {
                tracing::debug!(
                    event = "skipped",
                    object = %object,
                    reason = reason.as_str(),
                    "Skipped {}",
                    object
                );
            }
            IndexEvent::SeriesDropped {
                query,
                index,
                label,
            } => {
                tracing::warn!(
                    event = "series_dropped",
                    query = %query,
                    index,
                    label = %label,
                    "Result {} of {} has no label {:?}, dropped",
                    index,
                    query,
                    label
                );
            }
            IndexEvent::UnlabeledQuery { query, series } => {
                tracing::warn!(
                    event = "unlabeled_query",
                    query = %query,
                    series,
                    "Query {} returned {} series without labels, dropped",
                    query,
                    series
                );
            }
            IndexEvent::Published {
                kind,
                path,
                link,
                bytes,
            } => {
                tracing::info!(
                    event = "published",
                    kind = kind.as_str(),
                    path = %path,
                    link = %link,
                    bytes,
                    "Indexed {} in {} bytes to {} (link to {})",
                    kind,
                    bytes,
                    path,
                    link
                );
            }
            IndexEvent::AlreadyIndexed { kind, path } => {
                tracing::info!(
                    event = "already_indexed",
                    kind = kind.as_str(),
                    path = %path,
                    "Already indexed {} at {}",
                    kind,
                    path
                );
            }
        }
    }
}
