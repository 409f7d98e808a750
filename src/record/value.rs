//! Record values
//!
//! The tagged union stored under every key, plus the explicit type tag that is
//! persisted beside it so big integers and dates survive a trip through JSON.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{Result, ShardError};

/// Largest integer a double can represent exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// A value held by a record
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    BigInt(i128),
    Date(DateTime<Utc>),
    Null,
    Undefined,
    /// Nested object or array
    Json(Json),
}

/// Persisted type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Bigint,
    Date,
    Null,
    Undefined,
    Object,
}

impl Value {
    /// Type tag matching the runtime shape of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::String(_) => ValueType::String,
            Value::Integer(_) | Value::Float(_) => ValueType::Number,
            Value::Boolean(_) => ValueType::Boolean,
            Value::BigInt(_) => ValueType::Bigint,
            Value::Date(_) => ValueType::Date,
            Value::Null => ValueType::Null,
            Value::Undefined => ValueType::Undefined,
            Value::Json(_) => ValueType::Object,
        }
    }

    /// Bring a value to the shape it has after a trip through a shard file.
    ///
    /// Numbers outside the safe-integer range become `BigInt`, NaN and the
    /// infinities become `Null`, and dates are cut to millisecond precision.
    pub fn normalize(self) -> Self {
        match self {
            Value::Float(f) if !f.is_finite() => Value::Null,
            Value::Integer(n) if !(-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&n) => {
                Value::BigInt(n as i128)
            }
            Value::Float(f)
                if f.fract() == 0.0
                    && f.abs() > MAX_SAFE_INTEGER as f64
                    && f.abs() < i128::MAX as f64 =>
            {
                Value::BigInt(f as i128)
            }
            Value::Date(d) => Value::Date(d.trunc_subsecs(3)),
            other => other,
        }
    }

    /// Plain-JSON rendering: dates become ISO-8601 strings, big integers
    /// decimal strings, `Undefined` collapses to `null`.
    pub fn to_json(&self) -> Json {
        match self {
            Value::String(s) => Json::String(s.clone()),
            Value::Integer(n) => Json::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Boolean(b) => Json::Bool(*b),
            Value::BigInt(n) => Json::String(n.to_string()),
            Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Null | Value::Undefined => Json::Null,
            Value::Json(j) => j.clone(),
        }
    }

    /// Rebuild a value from its JSON rendering and stored tag
    pub fn from_json(json: &Json, tag: ValueType) -> Result<Self> {
        let mismatch = || {
            ShardError::InvalidRecord(format!("value {} does not match type {:?}", json, tag))
        };

        let value = match tag {
            ValueType::String => Value::String(json.as_str().ok_or_else(mismatch)?.to_string()),
            ValueType::Number => match json.as_i64() {
                Some(n) => Value::Integer(n),
                None if json.is_null() => Value::Null,
                None => Value::Float(json.as_f64().ok_or_else(mismatch)?),
            },
            ValueType::Boolean => Value::Boolean(json.as_bool().ok_or_else(mismatch)?),
            ValueType::Bigint => match json {
                Json::String(s) => Value::BigInt(s.trim().parse().map_err(|_| mismatch())?),
                Json::Number(n) => Value::BigInt(n.as_i64().ok_or_else(mismatch)? as i128),
                _ => return Err(mismatch()),
            },
            ValueType::Date => {
                let raw = json.as_str().ok_or_else(mismatch)?;
                let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| mismatch())?;
                Value::Date(parsed.with_timezone(&Utc))
            }
            ValueType::Null => Value::Null,
            ValueType::Undefined => Value::Undefined,
            ValueType::Object => Value::Json(json.clone()),
        };

        Ok(value.normalize())
    }

    /// Ordering used by sorted caches and `all()` snapshots.
    ///
    /// Values of different kinds order by kind: undefined < null < boolean <
    /// number < date < string < object. Numbers compare numerically across
    /// `Integer`, `Float` and `BigInt`.
    pub fn compare(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return a.compare(&b);
        }

        match self.rank().cmp(&other.rank()) {
            Ordering::Equal => {}
            unequal => return unequal,
        }

        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Json(a), Value::Json(b)) => a.to_string().cmp(&b.to_string()),
            _ => Ordering::Equal,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Undefined => 0,
            Value::Null => 1,
            Value::Boolean(_) => 2,
            Value::Integer(_) | Value::Float(_) | Value::BigInt(_) => 3,
            Value::Date(_) => 4,
            Value::String(_) => 5,
            Value::Json(_) => 6,
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        match self {
            Value::Integer(n) => Some(Numeric::Int(*n as i128)),
            Value::BigInt(n) => Some(Numeric::Int(*n)),
            Value::Float(f) => Some(Numeric::Float(*f)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy)]
enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    fn compare(&self, other: &Numeric) -> Ordering {
        match (self, other) {
            (Numeric::Int(a), Numeric::Int(b)) => a.cmp(b),
            (a, b) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Numeric::Int(n) => *n as f64,
            Numeric::Float(f) => *f,
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

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
    fn from(n: i64) -> Self {
        Value::Integer(n).normalize()
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<i128> for Value {
    fn from(n: i128) -> Self {
        Value::BigInt(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f).normalize()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d).normalize()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Untagged JSON: primitives map to their scalar variants, objects and
/// arrays become [`Value::Json`].
impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i).normalize(),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)).normalize(),
            },
            Json::String(s) => Value::String(s),
            other => Value::Json(other),
        }
    }
}
