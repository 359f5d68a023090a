//! Core types for VQL query results.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::value::Value;

/// A single row returned by a VQL query.
///
/// Fields keep the order the server emitted them in, which for a `SELECT`
/// is the column order of the query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create a new empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing the value of an existing field with the
    /// same name in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Builder-style [`Record::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get a value by field name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Get value as string.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| v.string())
    }

    /// Get value as f64.
    pub fn get_double(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.as_double())
    }

    /// Get value as i64.
    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_long())
    }

    /// Get value as bool.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    /// Get a timestamp field.
    ///
    /// Accepts RFC3339 strings and integer epoch seconds, the two encodings
    /// Velociraptor uses for times in query output.
    pub fn get_time(&self, name: &str) -> Option<DateTime<FixedOffset>> {
        match self.get(name)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s).ok(),
            Value::Long(secs) => {
                DateTime::from_timestamp(*secs, 0).map(|t| t.fixed_offset())
            }
            _ => None,
        }
    }

    /// Field names in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// Fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn from_map_access<'de, A: MapAccess<'de>>(
        mut map: A,
    ) -> Result<Self, A::Error> {
        let mut record = Record {
            fields: Vec::with_capacity(map.size_hint().unwrap_or(0)),
        };
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            record.insert(key, value);
        }
        Ok(record)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Record, A::Error> {
        Record::from_map_access(map)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Normalised field-name lookup.
///
/// Server-side column spellings for the same concept drift between releases
/// (`flow_id`, `FlowId`, `Flow`). Names are compared case-insensitively with
/// underscores ignored, and the first matching field in record order wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldLookup {
    names: Vec<String>,
}

impl FieldLookup {
    /// Build a lookup from candidate field names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names.into_iter().map(|n| normalize(n.as_ref())).collect(),
        }
    }

    /// Lookup used for flow identifiers returned by `collect_client()`.
    pub fn flow_id() -> Self {
        Self::new(["flow_id", "FlowId", "Flow"])
    }

    /// Returns true if `field` matches one of the candidate names.
    pub fn matches(&self, field: &str) -> bool {
        let field = normalize(field);
        self.names.iter().any(|n| *n == field)
    }

    /// Find the first non-empty string under a matching field.
    ///
    /// When the matching field holds a nested record the lookup descends into
    /// it once, so both `{"FlowId": "F.1"}` and `{"Flow": {"flow_id": "F.1"}}`
    /// resolve to `F.1`.
    pub fn find_string(&self, record: &Record) -> Option<String> {
        self.find_in(record, 1)
    }

    fn find_in(&self, record: &Record, depth: usize) -> Option<String> {
        for (key, value) in record.iter() {
            if !self.matches(key) {
                continue;
            }
            match value {
                Value::String(s) if !s.is_empty() => return Some(s.clone()),
                Value::Object(inner) if depth > 0 => {
                    if let Some(found) = self.find_in(inner, depth - 1) {
                        return Some(found);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

impl Default for FieldLookup {
    fn default() -> Self {
        Self::flow_id()
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Bytes read from a client's virtual filesystem.
///
/// Chunks are appended in arrival order; nothing is reordered or gap-filled,
/// so a short read from the server shows up as a short buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Download {
    data: Vec<u8>,
    chunks: usize,
}

impl Download {
    /// Append one chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.chunks += 1;
    }

    /// Total number of bytes received.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no bytes were received.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of chunks received.
    pub fn chunk_count(&self) -> usize {
        self.chunks
    }

    /// The received bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}
