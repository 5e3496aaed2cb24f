use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// Largest absolute difference at which a float and a decimal still count as equal.
pub const NUMERIC_TOLERANCE: f64 = 1e-6;

/// A flat record: field name to value. Nested maps only appear in keyed
/// comparison inputs (buckets, structures).
pub type Record = BTreeMap<String, Value>;

/// A single field value as produced by a record source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Float(f64),
    Bool(bool),
    Decimal(Decimal),
    Map(Record),
}

/// How strictly two values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceMode {
    /// Native equality only.
    Exact,
    /// Native equality, or a float and a decimal within [`NUMERIC_TOLERANCE`].
    #[default]
    NumericTolerant,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_map(&self) -> Option<&Record> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The identifier this value spells when it sits in a key field.
    ///
    /// `Null` and nested maps never identify anything; a record carrying one
    /// in its key field is treated as missing that field.
    pub fn as_identifier(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Float(f) => Some(f.to_string()),
            Value::Decimal(d) => Some(d.normalize().to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Map(_) => None,
        }
    }

    /// Equality under the given tolerance mode.
    ///
    /// Float vs decimal is the only cross-type pair that is ever coerced;
    /// every other combination uses strict value equality.
    pub fn loosely_equal(&self, other: &Value, mode: ToleranceMode) -> bool {
        if mode == ToleranceMode::NumericTolerant {
            match (self, other) {
                (Value::Float(f), Value::Decimal(d)) | (Value::Decimal(d), Value::Float(f)) => {
                    return match d.to_f64() {
                        Some(df) => (f - df).abs() <= NUMERIC_TOLERANCE,
                        None => false,
                    };
                }
                _ => {}
            }
        }
        self == other
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<Record> for Value {
    fn from(m: Record) -> Self {
        Value::Map(m)
    }
}

/// Build a [`Record`] from `(field, value)` pairs.
pub fn record<K, V, I>(fields: I) -> Record
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
