//! Dynamic value model
//!
//! [`Value`] is the weakly-typed form every mapped object passes through.
//! Unlike `serde_json::Value` it keeps high-precision decimals and
//! timestamps as first-class variants, so typed-to-typed mapping never
//! goes through a lossy textual or floating representation.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Ordered field map of a mapped object
pub type Fields = IndexMap<String, Value>;

/// Dynamic value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent / null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Binary floating point
    Float(f64),
    /// Text
    Text(String),
    /// High-precision decimal
    Decimal(Decimal),
    /// Point in time (UTC)
    Timestamp(DateTime<Utc>),
    /// Ordered sequence
    List(Vec<Value>),
    /// Nested object
    Map(Fields),
}

/// How decimals are rendered when leaving the dynamic model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecimalRepr {
    /// Floating number (lossy)
    #[default]
    Float,
    /// Exact text
    Text,
}

impl DecimalRepr {
    /// Pick representation from a "preserve decimal as string" flag
    #[inline]
    #[must_use]
    pub fn from_preserve(preserve_as_string: bool) -> Self {
        if preserve_as_string {
            Self::Text
        } else {
            Self::Float
        }
    }
}

impl Value {
    /// Short name of the variant, used in error messages
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Decimal(_) => "decimal",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Map(_) => "object",
        }
    }

    /// Check for [`Value::Null`]
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow as object fields
    #[inline]
    #[must_use]
    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            Self::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Borrow as list
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as text
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Convert wire data into the dynamic model
    ///
    /// Integral numbers become [`Value::Int`] when they fit an `i64` and an
    /// integral [`Value::Decimal`] when they only fit a `u64`; every other
    /// number becomes [`Value::Float`].
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Self::Int(i),
                (None, Some(u)) => Self::Decimal(Decimal::from(u)),
                (None, None) => n.as_f64().map_or(Self::Null, Self::Float),
            },
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into wire data, keeping nulls
    ///
    /// Timestamps become RFC 3339 text; decimals follow `decimals`, except
    /// integers beyond `i64` which stay exact JSON integers.
    /// Non-finite floats have no JSON form and become null.
    #[must_use]
    pub fn to_json(&self, decimals: DecimalRepr) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => float_to_json(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Decimal(d) => match decimals {
                DecimalRepr::Text => serde_json::Value::String(d.to_string()),
                DecimalRepr::Float => match (d.scale(), d.to_u64()) {
                    (0, Some(u)) if i64::try_from(u).is_err() => serde_json::Value::from(u),
                    _ => d
                        .to_string()
                        .parse::<f64>()
                        .map_or(serde_json::Value::Null, float_to_json),
                },
            },
            Self::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json(decimals)).collect())
            }
            Self::Map(fields) => serde_json::Value::Object(fields_to_json(fields, decimals)),
        }
    }

    /// Drop every null-valued field, at every nesting level
    ///
    /// Lists keep their length; only fields inside objects are removed.
    #[must_use]
    pub fn without_nulls(self) -> Self {
        match self {
            Self::Map(fields) => Self::Map(strip_nulls(fields)),
            Self::List(items) => Self::List(items.into_iter().map(Self::without_nulls).collect()),
            other => other,
        }
    }
}

/// Convert object fields into a JSON object, keeping nulls
#[must_use]
pub fn fields_to_json(
    fields: &Fields,
    decimals: DecimalRepr,
) -> serde_json::Map<String, serde_json::Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json(decimals)))
        .collect()
}

/// Remove null-valued fields recursively
#[must_use]
pub fn strip_nulls(fields: Fields) -> Fields {
    fields
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, v.without_nulls()))
        .collect()
}

fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from_json(&json)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}
