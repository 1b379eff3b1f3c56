//! # Tuple Values
//!
//! Decoder for the `[<timestamp>, "<number>"]` sample encoding used by the
//! time-series query API.
//!
//! The upstream formatting is not contractually fixed, so instead of a
//! generic structured decode the input is scanned by a small automaton:
//!
//! ```text
//! Start --'['--> Timestamp --','--> StringNumber --"..."--> Close --']'--> Done
//! ```
//!
//! Whitespace around each element is tolerated. The number is validated as a
//! finite decimal float but stored as the original string so that no
//! precision is lost on the way to the index.
//!
//! Decoding writes into an existing value and stops at the first error;
//! fields set before the failure keep their new content.

use serde::de::Error as _;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use std::fmt;
use thiserror::Error;

/// Expected shape, quoted in every error message.
const EXPECTED: &str = "expected [<timestamp int>, \"<number string>\"]";

// =============================================================================
// PARSE STATE
// =============================================================================

/// States of the tuple automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Start,
    Timestamp,
    StringNumber,
    Close,
    Done,
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Timestamp => "timestamp",
            Self::StringNumber => "string-number",
            Self::Close => "close",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Reasons a tuple value is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    /// `[]` carries no sample at all.
    #[error("{EXPECTED}, got an empty array")]
    EmptyTuple,

    /// The input diverged from the grammar while in `state`.
    #[error("{EXPECTED}, {reason} (in {state} state)")]
    MalformedTuple { state: ParseState, reason: String },
}

fn malformed(state: ParseState, reason: impl Into<String>) -> TupleError {
    TupleError::MalformedTuple {
        state,
        reason: reason.into(),
    }
}

// =============================================================================
// TUPLE VALUE
// =============================================================================

/// A single `(timestamp, value)` sample.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TupleValue {
    /// Sample time in epoch seconds.
    pub timestamp: i64,
    /// Decimal text of the sample, exactly as received.
    pub value: String,
}

impl TupleValue {
    #[must_use]
    pub fn new(timestamp: i64, value: impl Into<String>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    /// Decode a fresh value from raw JSON text.
    ///
    /// `null` yields the default value.
    pub fn parse(input: &str) -> Result<Self, TupleError> {
        let mut value = Self::default();
        value.decode_into(input)?;
        Ok(value)
    }

    /// Decode raw JSON text into `self`.
    ///
    /// `null` leaves `self` untouched. On error, the timestamp may already
    /// have been overwritten while the value keeps its prior content.
    pub fn decode_into(&mut self, input: &str) -> Result<(), TupleError> {
        let mut rest = input.trim();
        if rest == "null" {
            return Ok(());
        }
        if rest
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .is_some_and(|inner| inner.trim().is_empty())
        {
            return Err(TupleError::EmptyTuple);
        }

        let mut state = ParseState::Start;
        while let Some(c) = rest.chars().next() {
            state = match (state, c) {
                (ParseState::Start, '[') => {
                    rest = rest[1..].trim_start();
                    ParseState::Timestamp
                }
                (ParseState::Close, ']') => {
                    rest = rest[1..].trim_start();
                    ParseState::Done
                }
                (ParseState::Timestamp, c) if c != '[' && c != ']' => {
                    let pos = rest
                        .find(',')
                        .ok_or_else(|| malformed(state, "could not find comma"))?;
                    self.timestamp = rest[..pos].trim().parse::<i64>().map_err(|e| {
                        malformed(state, format!("timestamp was not an int64: {e}"))
                    })?;
                    rest = &rest[pos + 1..];
                    ParseState::StringNumber
                }
                (ParseState::StringNumber, c) if c != '[' && c != ']' => {
                    let pos = rest.find(']').ok_or_else(|| {
                        malformed(state, format!("could not find ending bracket in {rest:?}"))
                    })?;
                    let number = unquote_number(rest[..pos].trim())
                        .map_err(|reason| malformed(state, reason))?;
                    self.value = number.to_string();
                    rest = &rest[pos..];
                    ParseState::Close
                }
                (state, c) => {
                    return Err(malformed(state, format!("unexpected character {c:?}")));
                }
            };
        }

        if state != ParseState::Done {
            return Err(malformed(state, "input ended before the closing bracket"));
        }
        Ok(())
    }

    /// Canonical JSON text of this sample, `[<timestamp>,"<value>"]`.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Strip the quotes from a number string and check that it is a finite
/// decimal float with no padding inside the quotes.
fn unquote_number(quoted: &str) -> Result<&str, String> {
    let number = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| "could not find number string".to_string())?;
    if number.trim() != number {
        return Err("number was not a valid float64: whitespace in string".to_string());
    }
    match number.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(number),
        Ok(_) => Err(format!("number {number:?} is not finite")),
        Err(e) => Err(format!("number was not a valid float64: {e}")),
    }
}

// =============================================================================
// SERDE
// =============================================================================

impl Serialize for TupleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.timestamp)?;
        tuple.serialize_element(&self.value)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for TupleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Self::parse(raw.get()).map_err(D::Error::custom)
    }
}

// =============================================================================
// TESTS
// =============================================================================
