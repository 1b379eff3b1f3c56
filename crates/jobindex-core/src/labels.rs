//! # Label Sets
//!
//! The `metric` object attached to each time-series result.
//!
//! Labels are kept in a `BTreeMap`, so iteration is ordered by key and the
//! representative label of a query does not depend on how the upstream
//! serializer happened to order the object.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;

/// String-keyed dimensions of a single series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode raw JSON text into this set.
    ///
    /// - `null` leaves the set untouched.
    /// - `{}` clears the set in place.
    /// - Any other object is merged in, replacing existing keys.
    pub fn decode_into(&mut self, input: &str) -> Result<(), serde_json::Error> {
        match input.trim() {
            "null" => Ok(()),
            "{}" => {
                self.0.clear();
                Ok(())
            }
            other => {
                let decoded: BTreeMap<String, String> = serde_json::from_str(other)?;
                self.0.extend(decoded);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// The lexicographically smallest label key, if any.
    #[must_use]
    pub fn first_key(&self) -> Option<&str> {
        self.0.keys().next().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'de> Deserialize<'de> for LabelSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let mut labels = Self::new();
        labels.decode_into(raw.get()).map_err(D::Error::custom)?;
        Ok(labels)
    }
}
