//! Lenient field deserializers.
//!
//! Upstream documents are often partially populated: numbers arrive as
//! strings, strings as numbers, and any field may be `null`. These helpers
//! coerce such values to a sensible default instead of failing the whole
//! document.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserialize any scalar as a string. `null` and containers become `""`.
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_string(&Value::deserialize(deserializer)?))
}

/// Deserialize a number or numeric string as `i64`. Anything else becomes `0`.
pub fn integer<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_f64(&Value::deserialize(deserializer)?) as i64)
}

/// Deserialize a number or numeric string as `f64`. Anything else becomes `0.0`.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_f64(&Value::deserialize(deserializer)?))
}

/// Deserialize a non-negative count as `u64`. Anything else becomes `0`.
pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = value_to_f64(&Value::deserialize(deserializer)?);
    Ok(if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    })
}

/// Deserialize `T`, treating `null` as `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn value_to_f64(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}
