use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Generic runtime value for record fields, SQL variables, and RPC arguments.
///
/// Supports all JSON-compatible types plus binary data. Serializes to
/// `MsgPack` via `rmp-serde` when it crosses an RPC boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// Binary data (not directly representable in JSON).
    Bytes(Vec<u8>),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object. Uses `BTreeMap` for deterministic serialization order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string payload, if this is a `Value::String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is a `Value::Int`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts a `serde_json::Value` into a [`Value`].
    ///
    /// Integers that fit in `i64` become `Int`; every other number becomes `Float`.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value into a `serde_json::Value`.
    ///
    /// Bytes become an array of numbers; non-finite floats become `null`.
    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(bytes) => serde_json::Value::Array(
                bytes.into_iter().map(serde_json::Value::from).collect(),
            ),
            Value::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Value::into_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other.clone().into_json()),
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
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Ordered field map of a record, an example filter, or a SQL result row.
pub type Fields = BTreeMap<String, Value>;

/// Builds a [`Fields`] map from `(name, value)` pairs.
///
/// ```
/// use scene_core::types::{fields, Value};
///
/// let f = fields([("total", Value::Int(42)), ("state", "open".into())]);
/// assert_eq!(f.len(), 2);
/// ```
pub fn fields<K, I>(pairs: I) -> Fields
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Value)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Transport-safe value carried in operation baggage.
///
/// Restricted to kinds that serialize deterministically across RPC
/// boundaries; arbitrary in-process data belongs in operation props.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum BaggageValue {
    /// UTF-8 string.
    String(String),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Nested mapping, ordered for deterministic encoding.
    Map(BTreeMap<String, BaggageValue>),
}

impl From<&str> for BaggageValue {
    fn from(s: &str) -> Self {
        BaggageValue::String(s.to_string())
    }
}

impl From<String> for BaggageValue {
    fn from(s: String) -> Self {
        BaggageValue::String(s)
    }
}

impl From<i64> for BaggageValue {
    fn from(i: i64) -> Self {
        BaggageValue::Int(i)
    }
}

impl From<f64> for BaggageValue {
    fn from(x: f64) -> Self {
        BaggageValue::Float(x)
    }
}

impl From<bool> for BaggageValue {
    fn from(b: bool) -> Self {
        BaggageValue::Bool(b)
    }
}

/// Baggage mapping attached to an operation.
pub type Baggage = BTreeMap<String, BaggageValue>;

/// Primary-key field name used when a record class does not declare one.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Identifies a kind of stored record.
///
/// The class name doubles as the resource name used for subscriptions and
/// change notifications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordClass {
    /// Table or collection name.
    pub name: String,
    /// Name of the field that uniquely identifies a record of this class.
    pub primary_key: String,
}

impl RecordClass {
    /// Creates a record class with the default `"id"` primary key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }

    /// Overrides the primary-key field name.
    #[must_use]
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A stored record: its class plus its field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Class this record belongs to.
    pub class: RecordClass,
    /// Field values, including the primary key once assigned.
    pub fields: Fields,
}

impl Record {
    /// Creates a record of `class` with the given fields.
    #[must_use]
    pub fn new(class: RecordClass, fields: Fields) -> Self {
        Self { class, fields }
    }

    /// Returns the primary-key value, if assigned.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.fields.get(&self.class.primary_key)
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns `true` if every `(field, value)` in `example` is present and equal.
    ///
    /// Values are compared literally: a string that looks like an operator
    /// expression (e.g. `"> 5"`) only matches the identical string.
    #[must_use]
    pub fn matches(&self, example: &Fields) -> bool {
        example
            .iter()
            .all(|(field, expected)| self.fields.get(field) == Some(expected))
    }
}
