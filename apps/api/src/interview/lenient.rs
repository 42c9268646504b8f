//! Tolerant field deserializers for model-produced JSON.
//!
//! Models routinely emit `"7"` instead of `7`, `7.5` for an integer score, or
//! `"yes"` for a boolean. These helpers accept those spellings and normalise
//! them, so that a payload is rejected only when a field is structurally wrong.

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches("/10").trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Integer score on the 1–10 scale. Out-of-range values are clamped.
pub fn score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_number(&value)
        .map(|n| n.round().clamp(1.0, 10.0) as u8)
        .ok_or_else(|| de::Error::custom(format!("expected a 1-10 score, got {value}")))
}

/// Integer rating on the 0–10 scale (keyword match, STAR coverage).
pub fn rating<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_number(&value)
        .map(|n| n.round().clamp(0.0, 10.0) as u8)
        .ok_or_else(|| de::Error::custom(format!("expected a 0-10 rating, got {value}")))
}

/// Any finite number, possibly quoted.
pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_number(&value).ok_or_else(|| de::Error::custom(format!("expected a number, got {value}")))
}

/// Non-negative integer, possibly quoted or fractional.
pub fn count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_number(&value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as usize)
        .ok_or_else(|| de::Error::custom(format!("expected a count, got {value}")))
}

/// Boolean, also accepting "true"/"yes"/"false"/"no".
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            _ => Err(de::Error::custom(format!("expected a boolean, got {value}"))),
        },
        _ => Err(de::Error::custom(format!("expected a boolean, got {value}"))),
    }
}

/// List of strings where stray non-string items are stringified and blanks dropped.
pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect()),
        Value::String(s) if !s.trim().is_empty() => Ok(vec![s.trim().to_string()]),
        Value::Null => Ok(Vec::new()),
        other => Err(de::Error::custom(format!("expected a list of strings, got {other}"))),
    }
}
