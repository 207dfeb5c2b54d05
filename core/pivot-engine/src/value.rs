//! FILENAME: core/pivot-engine/src/value.rs
//! Scalar values and records.
//!
//! Records are open attribute maps. For grouping purposes every attribute
//! value is normalized to a string key part; absent and null attributes
//! collapse onto the `NULL_KEY` sentinel so null groups aggregate like any
//! other group.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Key part used for absent or null attribute values.
pub const NULL_KEY: &str = "null";

// ============================================================================
// SCALAR VALUE
// ============================================================================

/// A single attribute value from a source record.
///
/// Serializes as a plain JSON scalar. JSON has no literal for NaN or the
/// infinities, so non-finite numbers travel as `{"$num": "NaN"}`,
/// `{"$num": "Infinity"}` or `{"$num": "-Infinity"}`.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

/// NaN values compare equal to each other so that de-duplicating
/// aggregators treat every NaN as the same value.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Numeric reading of the value: numbers as-is, text parsed after
    /// trimming. Booleans, nulls and NaN yield `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Value::Number(n) => *n,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            Value::Bool(_) | Value::Null => return None,
        };
        if n.is_nan() {
            None
        } else {
            Some(n)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Renders the normalized key part for this value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(NULL_KEY),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&number_key(*n)),
            Value::Text(s) => f.write_str(s),
        }
    }
}

fn number_key(n: f64) -> String {
    if n == 0.0 {
        // Also folds -0 onto "0".
        "0".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.is_nan() {
        "NaN".to_string()
    } else {
        format!("{}", n)
    }
}

// ============================================================================
// SERDE
// ============================================================================

/// Map key carrying a non-finite number on the wire.
const NON_FINITE_KEY: &str = "$num";

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Number(n) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(NON_FINITE_KEY, &number_key(*n))?;
                map.end()
            }
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("null, a boolean, a number, a string or a {\"$num\": ...} object")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let key: Option<String> = map.next_key()?;
        if key.as_deref() != Some(NON_FINITE_KEY) {
            return Err(de::Error::custom("expected a single \"$num\" entry"));
        }
        let tag: String = map.next_value()?;
        let n = match tag.as_str() {
            "NaN" => f64::NAN,
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            other => {
                return Err(de::Error::invalid_value(
                    de::Unexpected::Str(other),
                    &"NaN, Infinity or -Infinity",
                ))
            }
        };
        if map.next_key::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::custom("unexpected entry after \"$num\""));
        }
        Ok(Value::Number(n))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Normalizes an attribute lookup into a grouping key part.
pub fn normalize(value: Option<&Value>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => NULL_KEY.to_string(),
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// An immutable input row: attribute name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    attrs: FxHashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attrs.get(attr)
    }

    pub fn contains(&self, attr: &str) -> bool {
        self.attrs.contains_key(attr)
    }

    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(attr.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(attr, value);
        self
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attribute-sorted view, stable across insertion histories.
    pub fn canonical(&self) -> BTreeMap<&str, &Value> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v)).collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Builds a [`Record`] from `"attr" => value` pairs.
#[macro_export]
macro_rules! record {
    () => { $crate::value::Record::new() };
    ($($attr:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::value::Record::new();
        $( record.insert($attr, $crate::value::Value::from($value)); )+
        record
    }};
}
