//! Metric values and payload decoding.
//!
//! Venus OS publishes JSON objects of the form `{"value": X}`. An empty
//! payload means the topic was cleared and carries no value.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Raw value carried by a metric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<MetricValue>),
}

impl MetricValue {
    /// Numeric coercion: numbers as-is, strings if they parse as a float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
        }
    }

    /// Convert a JSON value. Objects are kept as their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else {
                    n.as_f64().map(Self::Float).unwrap_or(Self::Null)
                }
            }
            Value::String(s) => Self::String(s.clone()),
            Value::Array(arr) => Self::Array(arr.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::String(value.to_string()),
        }
    }

    /// Convert to JSON for outbound payloads.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Boolean(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(arr) => Value::Array(arr.iter().map(Self::to_json).collect()),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::String(s) => f.write_str(s),
            Self::Array(arr) => {
                let items: Vec<String> = arr.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for MetricValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<MetricValue>> From<Option<T>> for MetricValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Decode an MQTT payload.
///
/// Returns `Ok(None)` for an empty payload. `{"value": X}` yields `X`; any
/// other JSON is taken as the value itself; non-JSON text falls back to a
/// number, a boolean or the trimmed string.
pub fn decode_payload(payload: &[u8]) -> Result<Option<MetricValue>> {
    if payload.is_empty() {
        return Ok(None);
    }

    if let Ok(json) = serde_json::from_slice::<Value>(payload) {
        let value = match json {
            Value::Object(ref map) if map.contains_key("value") => {
                MetricValue::from_json(&map["value"])
            }
            other => MetricValue::from_json(&other),
        };
        return Ok(Some(value));
    }

    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::Payload(format!("Invalid UTF-8 payload: {}", e)))?
        .trim();
    if let Ok(i) = text.parse::<i64>() {
        return Ok(Some(MetricValue::Integer(i)));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Ok(Some(MetricValue::Float(f)));
    }
    if let Ok(b) = text.parse::<bool>() {
        return Ok(Some(MetricValue::Boolean(b)));
    }
    Ok(Some(MetricValue::String(text.to_string())))
}

/// Encode a value as a Venus OS write payload.
pub fn encode_payload(value: &MetricValue) -> Vec<u8> {
    serde_json::json!({ "value": value.to_json() })
        .to_string()
        .into_bytes()
}
