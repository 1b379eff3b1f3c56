//! # Metric Consolidator
//!
//! Flattens a `job_metrics.json` dump into one scalar per key.
//!
//! The dump is a stream of JSON objects, each mapping query names to
//! instant-query responses. Fragments are decoded one after another and
//! merged by query name; a later fragment replaces an earlier entry.
//!
//! For each successful vector query:
//! - a single unlabeled series is published under the bare query name;
//! - otherwise every series is published as `name{label="value"}`, where
//!   `label` is the smallest label key of the first labeled series.

use crate::labels::LabelSet;
use crate::primitives::{ERROR_SNIPPET_LENGTH, SUCCESS_STATUS, VECTOR_RESULT};
use crate::sink::{EventSink, IndexEvent};
use crate::tuple::TupleValue;
use crate::{IndexError, OutputMetric};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One time series of an instant-query response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LabeledSeries {
    #[serde(rename = "metric", default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub value: TupleValue,
}

/// The `data` member of a query response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryData {
    #[serde(rename = "resultType", default, deserialize_with = "null_as_default")]
    pub result_type: String,
    #[serde(rename = "result", default, deserialize_with = "null_as_default")]
    pub series: Vec<LabeledSeries>,
}

/// Response of a single named query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: QueryData,
}

// =============================================================================
// METRICS DOCUMENT
// =============================================================================

/// All query responses of a dump, keyed by query name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsDocument {
    queries: BTreeMap<String, QueryResult>,
    fragments: usize,
}

impl MetricsDocument {
    /// Decode every concatenated JSON value in `raw`.
    ///
    /// A `null` fragment merges nothing but still counts as a fragment, and a
    /// `null` query entry decodes as an empty (skipped) response. Fails on
    /// the first fragment that is not a valid query map; the error names the
    /// 1-based fragment ordinal and quotes the input around it.
    pub fn decode(raw: &[u8]) -> Result<Self, IndexError> {
        let mut document = Self::default();
        let mut stream = serde_json::Deserializer::from_slice(raw)
            .into_iter::<Option<BTreeMap<String, Option<QueryResult>>>>();

        while let Some(fragment) = stream.next() {
            match fragment {
                Ok(queries) => document.merge(
                    queries
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(name, result)| (name, result.unwrap_or_default()))
                        .collect(),
                ),
                Err(e) => {
                    return Err(IndexError::Decode {
                        context: format!("metrics fragment {}", document.fragments + 1),
                        reason: format!("{e} near {:?}", snippet(raw, stream.byte_offset())),
                    });
                }
            }
        }
        Ok(document)
    }

    /// Merge a fragment, replacing queries that are already present.
    pub fn merge(&mut self, queries: BTreeMap<String, QueryResult>) {
        self.fragments += 1;
        self.queries.extend(queries);
    }

    /// Number of fragments merged so far.
    #[must_use]
    pub const fn fragments(&self) -> usize {
        self.fragments
    }

    #[must_use]
    pub fn get(&self, query: &str) -> Option<&QueryResult> {
        self.queries.get(query)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryResult)> {
        self.queries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Up to `ERROR_SNIPPET_LENGTH` bytes of `raw` starting at `offset`.
fn snippet(raw: &[u8], offset: usize) -> String {
    let start = offset.min(raw.len());
    let end = start.saturating_add(ERROR_SNIPPET_LENGTH).min(raw.len());
    String::from_utf8_lossy(&raw[start..end]).into_owned()
}

// =============================================================================
// METRIC SET
// =============================================================================

/// Flattened metrics keyed by (possibly label-qualified) name.
///
/// Serializes as a JSON object with keys in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<String, OutputMetric>);

impl MetricSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: &TupleValue) {
        self.0.insert(name.into(), OutputMetric::from(value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OutputMetric> {
        self.0.get(name)
    }

    /// The metric that must be present before publication.
    pub fn require(&self, name: &str) -> Result<&OutputMetric, IndexError> {
        self.get(name)
            .ok_or_else(|| IndexError::MissingRequiredMetric {
                metric: name.to_string(),
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, OutputMetric> {
        self.0.iter()
    }

    /// Serialized body of a `job-metrics` index entry.
    pub fn to_json(&self) -> Result<Vec<u8>, IndexError> {
        serde_json::to_vec(self).map_err(|e| {
            IndexError::Serialization(format!("unable to marshal output metrics: {e}"))
        })
    }
}

/// Key of a series qualified by its representative label:
/// `query{label="value"}`, with the value quoted by [`quote_label_value`].
#[must_use]
pub fn composite_key(query: &str, label: &str, value: &str) -> String {
    format!("{query}{{{label}={}}}", quote_label_value(value))
}

/// Double-quote `value` for a composite key.
///
/// `"` and `\` are backslash-escaped, as are the control characters with a
/// short form (`\a \b \f \n \r \t \v`). Other non-printable characters
/// become `\xNN` below U+0080 (C0 controls and DEL), `\uNNNN` in the basic
/// plane and `\UNNNNNNNN` above it, in lowercase hex. Printable characters,
/// combining marks included, are copied as they are.
#[must_use]
pub fn quote_label_value(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            _ if is_printable(c) => quoted.push(c),
            '\u{07}' => quoted.push_str("\\a"),
            '\u{08}' => quoted.push_str("\\b"),
            '\u{0C}' => quoted.push_str("\\f"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\u{0B}' => quoted.push_str("\\v"),
            _ => {
                let code = u32::from(c);
                if code < 0x80 {
                    quoted.push_str(&format!("\\x{code:02x}"));
                } else if code < 0x1_0000 {
                    quoted.push_str(&format!("\\u{code:04x}"));
                } else {
                    quoted.push_str(&format!("\\U{code:08x}"));
                }
            }
        }
    }
    quoted.push('"');
    quoted
}

/// Whether `c` is shown as itself: not a control, format, private-use or
/// noncharacter code point, and not a separator other than the ASCII space.
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    !matches!(
        u32::from(c),
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x0890..=0x0891
            | 0x08E2
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xE000..=0xF8FF
            | 0xFDD0..=0xFDEF
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0xFFFE..=0xFFFF
            | 0x110BD
            | 0x110CD
            | 0x13430..=0x1343F
            | 0x1BCA0..=0x1BCA3
            | 0x1D173..=0x1D17A
            | 0xE0001
            | 0xE0020..=0xE007F
            | 0xF0000..=0x10FFFF
    )
}

// =============================================================================
// CONSOLIDATOR
// =============================================================================

/// Flattens a [`MetricsDocument`] into a [`MetricSet`].
pub struct Consolidator<'a> {
    sink: &'a dyn EventSink,
}

impl<'a> Consolidator<'a> {
    #[must_use]
    pub fn new(sink: &'a dyn EventSink) -> Self {
        Self { sink }
    }

    /// Flatten every usable query of `document`.
    #[must_use]
    pub fn consolidate(&self, document: &MetricsDocument) -> MetricSet {
        let mut metrics = MetricSet::new();
        for (name, result) in document.iter() {
            self.flatten_query(name, result, &mut metrics);
        }
        metrics
    }

    /// Flatten `document` and check that `required` is present.
    pub fn consolidate_required(
        &self,
        document: &MetricsDocument,
        required: &str,
    ) -> Result<MetricSet, IndexError> {
        let metrics = self.consolidate(document);
        metrics.require(required)?;
        Ok(metrics)
    }

    fn flatten_query(&self, name: &str, result: &QueryResult, metrics: &mut MetricSet) {
        if result.status != SUCCESS_STATUS || result.data.result_type != VECTOR_RESULT {
            return;
        }
        let series = &result.data.series;
        match series.as_slice() {
            [] => return,
            [only] if only.labels.is_empty() => {
                metrics.insert(name, &only.value);
                return;
            }
            _ => {}
        }

        let Some(label) = series.iter().find_map(|s| s.labels.first_key()) else {
            self.sink.emit(IndexEvent::UnlabeledQuery {
                query: name.to_string(),
                series: series.len(),
            });
            return;
        };

        for (index, s) in series.iter().enumerate() {
            match s.labels.get(label) {
                Some(value) => metrics.insert(composite_key(name, label, value), &s.value),
                None => self.sink.emit(IndexEvent::SeriesDropped {
                    query: name.to_string(),
                    index,
                    label: label.to_string(),
                }),
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
