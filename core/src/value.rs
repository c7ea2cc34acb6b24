//! SQL values and ordered row containers.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Text layout used for every normalized date-time value.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single SQL value.
///
/// Mirrors SQLite's storage classes with one addition: [`Value::DateTime`]
/// lets callers hand a structured timestamp to the record engine, which
/// normalizes it to `YYYY-MM-DD HH:MM:SS` text before binding.
///
/// # Examples
///
/// ```
/// use tablerow_core::Value;
///
/// assert_eq!(Value::from(42), Value::Integer(42));
/// assert_eq!(Value::from("abc").as_str(), Some("abc"));
/// assert!(Value::from(None::<i64>).is_null());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
    /// Structured timestamp, rendered as text when bound.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a numeric view of integers and reals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Renders a date-time as normalized text; other variants are cloned.
    pub fn normalized(&self) -> Value {
        match self {
            Value::DateTime(dt) => Value::Text(dt.format(DATETIME_FORMAT).to_string()),
            other => other.clone(),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One table row: column name → value, in database column order.
pub type Row = IndexMap<String, Value>;

/// Named statement parameters. Keys are bound as `:key` unless they already
/// carry a `:`, `@` or `$` prefix.
pub type Params = IndexMap<String, Value>;

/// Builds a [`Row`] (or [`Params`]) from `(name, value)` pairs.
///
/// ```
/// use tablerow_core::{Value, row};
///
/// let r = row([("a", 1), ("b", 2)]);
/// assert_eq!(r.keys().collect::<Vec<_>>(), ["a", "b"]);
/// assert_eq!(r["b"], Value::Integer(2));
/// ```
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
