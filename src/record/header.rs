//! Header folding
//!
//! On the wire a header name may appear any number of times. In a record
//! file each name appears once: a single value is stored as a JSON string,
//! several values as an array of strings in wire order.

use crate::http::Headers;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of one folded header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Nothing usable was stored under the name
    Absent,
    Scalar(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    /// All values in wire order
    pub fn values(&self) -> &[String] {
        match self {
            HeaderValue::Absent => &[],
            HeaderValue::Scalar(value) => std::slice::from_ref(value),
            HeaderValue::Multi(values) => values,
        }
    }

    /// The first value, if any
    pub fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => HeaderValue::Scalar(s),
            serde_json::Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(s) => values.push(s),
                        _ => return HeaderValue::Absent,
                    }
                }
                if values.is_empty() {
                    HeaderValue::Absent
                } else {
                    HeaderValue::Multi(values)
                }
            }
            _ => HeaderValue::Absent,
        }
    }
}

/// Folded header map, as stored in a record file
///
/// Keys keep the case they were received with; lookups ignore case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoldedHeaders {
    entries: BTreeMap<String, HeaderValue>,
}

impl FoldedHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_of(&self, name: &str) -> Option<&String> {
        self.entries.keys().find(|k| k.eq_ignore_ascii_case(name))
    }

    /// Look up a header by case-insensitive name
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.key_of(name).and_then(|k| self.entries.get(k))
    }

    /// First value of a header
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderValue::first)
    }

    /// Whether a header carries at least one value
    pub fn contains(&self, name: &str) -> bool {
        self.first(name).is_some()
    }

    /// Store a value, replacing any entry with the same name in another case
    pub fn insert(&mut self, name: impl Into<String>, value: HeaderValue) {
        let name = name.into();
        self.remove(&name);
        self.entries.insert(name, value);
    }

    /// Store a single value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name, HeaderValue::Scalar(value.into()));
    }

    /// Remove a header, returning what was stored
    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        let key = self.key_of(name)?.clone();
        self.entries.remove(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fold a wire header multimap
///
/// Names are grouped case-insensitively under the case of their first
/// occurrence. A name with one value becomes a scalar, more become an array.
pub fn fold(headers: &Headers) -> FoldedHeaders {
    let mut folded = FoldedHeaders::new();
    for name in headers.names() {
        let mut values: Vec<String> = headers
            .get_all(name)
            .into_iter()
            .map(str::to_string)
            .collect();
        let value = match values.len() {
            0 => continue,
            1 => HeaderValue::Scalar(values.remove(0)),
            _ => HeaderValue::Multi(values),
        };
        folded.entries.insert(name.to_string(), value);
    }
    folded
}

/// Unfold a folded map back into a wire header multimap
pub fn unfold(folded: &FoldedHeaders) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in folded.iter() {
        for v in value.values() {
            headers.insert(name, v.as_str());
        }
    }
    headers
}

impl Serialize for FoldedHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present = self
            .entries
            .values()
            .filter(|v| !matches!(v, HeaderValue::Absent))
            .count();
        let mut map = serializer.serialize_map(Some(present))?;
        for (name, value) in &self.entries {
            match value {
                HeaderValue::Absent => {}
                HeaderValue::Scalar(s) => map.serialize_entry(name, s)?,
                HeaderValue::Multi(values) => map.serialize_entry(name, values)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FoldedHeaders {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
        let entries = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name, HeaderValue::from_json(value)))
            .collect();
        Ok(FoldedHeaders { entries })
    }
}
