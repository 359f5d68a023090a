//! Value types for VQL query results.

use std::fmt;

use base64::Engine;
use ordered_float::OrderedFloat;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::types::Record;

/// Represents a single cell in a VQL result row.
///
/// Velociraptor serialises rows as JSON, so every value the server can send
/// maps onto one of these variants. Decoding is exhaustive: there is no
/// "unknown" fallback.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Null value.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed 64-bit integer.
    Long(i64),

    /// Unsigned 64-bit integer too large for `Long`.
    UnsignedLong(u64),

    /// 64-bit floating point value.
    Double(OrderedFloat<f64>),

    /// String value.
    String(String),

    /// Raw bytes. Serialised as standard base64.
    Binary(Vec<u8>),

    /// Ordered sequence of values.
    Array(Vec<Value>),

    /// Nested mapping.
    Object(Record),
}

impl Value {
    /// Returns the value as a string reference if it is a `String` variant.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an owned string if it is a `String` variant.
    pub fn string(&self) -> Option<String> {
        self.as_string().map(str::to_string)
    }

    /// Returns the value as a f64 if it is a `Double` variant.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(f) => Some(f.into_inner()),
            _ => None,
        }
    }

    /// Returns the value as a bool if it is a `Bool` variant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an i64 if it is a `Long` variant.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a u64 if it is a non-negative integer.
    pub fn as_unsigned_long(&self) -> Option<u64> {
        match self {
            Value::UnsignedLong(u) => Some(*u),
            Value::Long(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Returns the value as a byte slice if it is a `Binary` variant.
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the elements if this is an `Array` variant.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the nested record if this is an `Object` variant.
    pub fn as_object(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record),
            _ => None,
        }
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Long(i) => write!(f, "{}", i),
            Value::UnsignedLong(u) => write!(f, "{}", u),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{}", s),
            Value::Binary(b) => write!(f, "<binary {} bytes>", b.len()),
            Value::Array(_) | Value::Object(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Long(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Binary(b)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Object(r)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Long(i) => serializer.serialize_i64(*i),
            Value::UnsignedLong(u) => serializer.serialize_u64(*u),
            Value::Double(d) => serializer.serialize_f64(d.into_inner()),
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(b) => {
                serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(record) => record.serialize(serializer),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Long(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => Value::Long(i),
            Err(_) => Value::UnsignedLong(v),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(OrderedFloat::from(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Binary(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Binary(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Value, A::Error> {
        Record::from_map_access(map).map(Value::Object)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Value accessor tests
    // =========================================================================

    #[test]
    fn test_as_string() {
        let v = Value::String("hello".to_string());
        assert_eq!(v.as_string(), Some("hello"));

        // Wrong type returns None
        assert_eq!(Value::Long(42).as_string(), None);
        assert_eq!(Value::Null.as_string(), None);
    }

    #[test]
    fn test_as_unsigned_long_accepts_non_negative_long() {
        assert_eq!(Value::UnsignedLong(u64::MAX).as_unsigned_long(), Some(u64::MAX));
        assert_eq!(Value::Long(7).as_unsigned_long(), Some(7));
        assert_eq!(Value::Long(-7).as_unsigned_long(), None);
    }

    #[test]
    fn test_as_object_and_array() {
        let v: Value = serde_json::from_str(r#"{"a": [1, 2]}"#).unwrap();
        let record = v.as_object().unwrap();
        let items = record.get("a").and_then(Value::as_array).unwrap();
        assert_eq!(items, &[Value::Long(1), Value::Long(2)]);
        assert!(Value::Null.as_object().is_none());
    }

    // =========================================================================
    // Decoding tests
    // =========================================================================

    #[test]
    fn test_decode_scalars() {
        let v: Value = serde_json::from_str("true").unwrap();
        assert_eq!(v, Value::Bool(true));

        let v: Value = serde_json::from_str("-12").unwrap();
        assert_eq!(v, Value::Long(-12));

        let v: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(v, Value::UnsignedLong(u64::MAX));

        let v: Value = serde_json::from_str("2.5").unwrap();
        assert_eq!(v, Value::Double(OrderedFloat::from(2.5)));

        let v: Value = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn test_decode_preserves_field_order() {
        let v: Value = serde_json::from_str(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    // =========================================================================
    // Serialization and display tests
    // =========================================================================

    #[test]
    fn test_binary_serializes_as_base64() {
        let v = Value::Binary(b"ab".to_vec());
        assert_eq!(serde_json::to_string(&v).unwrap(), r#""YWI=""#);
        assert_eq!(v.to_string(), "<binary 2 bytes>");
    }

    #[test]
    fn test_display_nested() {
        let v: Value = serde_json::from_str(r#"{"b": [true, null], "a": "x"}"#).unwrap();
        assert_eq!(v.to_string(), r#"{"b":[true,null],"a":"x"}"#);
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Long(-100).to_string(), "-100");
        assert_eq!(Value::String("hi".to_string()).to_string(), "hi");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::from("a"), Value::String("a".to_string()));
        assert_ne!(Value::Long(42), Value::UnsignedLong(42));
        assert_ne!(Value::String("42".to_string()), Value::Long(42));
    }
}
