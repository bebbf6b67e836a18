//! Response normalization: loose model text in, fixed-shape payload out
//!
//! Models are asked for JSON but answer with code fences, preambles and the
//! occasional refusal. [`extract_json`] recovers a JSON value when it can;
//! [`normalize`] turns that into a feature payload and substitutes the
//! payload's default shape when it cannot. Parsing never fails from the
//! caller's point of view.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

const FENCE: &str = "```";

/// A payload that can be built from a parsed JSON object or, failing that,
/// from the raw response text.
pub trait Normalized: Sized {
    /// Build from a parsed object. Missing or mistyped fields take their defaults.
    fn from_object(object: &Map<String, Value>) -> Self;

    /// Default shape that keeps the raw response and leaves every structured field empty
    fn fallback(raw: &str) -> Self;
}

/// Remove a surrounding markdown code fence, with or without a language tag.
/// Text without a leading fence is returned trimmed and otherwise unchanged.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with(FENCE) {
        return text;
    }

    let body = match text.find('\n') {
        Some(newline) => &text[newline + 1..],
        None => &text[FENCE.len()..],
    };
    let body = body.trim_end();
    body.strip_suffix(FENCE).unwrap_or(body).trim()
}

/// Recover a JSON value from model output.
///
/// Tries the fence-stripped text as a whole, then the span from the first
/// `{` to the last `}`. Stray braces outside the real object defeat the
/// second step; malformed JSON such as trailing commas is not repaired.
pub fn extract_json(text: &str) -> Option<Value> {
    let body = strip_code_fence(text);

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return Some(value);
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

/// Turn model output into `T`, falling back to `T::fallback` when no JSON object can be found
pub fn normalize<T: Normalized>(raw: &str) -> T {
    match extract_json(raw) {
        Some(Value::Object(object)) => T::from_object(&object),
        Some(other) => {
            warn!(
                "Model returned JSON {} instead of an object, using fallback structure",
                json_kind(&other)
            );
            T::fallback(raw)
        }
        None => {
            warn!("Failed to parse model response as JSON, using fallback structure");
            T::fallback(raw)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode one field, using the default if it is missing or has the wrong shape
pub fn field<T: DeserializeOwned + Default>(object: &Map<String, Value>, key: &str) -> T {
    match object.get(key) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            debug!("Field '{}' has unexpected shape: {}", key, e);
            T::default()
        }),
    }
}

/// First of several keys that is present and not null
pub fn first_present<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find(|v| !v.is_null())
}

/// Decode a list of records item by item, dropping items that do not fit
pub fn record_list<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Dropping list item with unexpected shape: {}", e);
                None
            }
        })
        .collect()
}

/// A list of strings. Non-string items are rendered as text; a bare string
/// becomes a one-item list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Text rendering of a scalar or structured value. `None` for null and blank strings.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// `deserialize_with` helpers for record fields. None of them fail; a value
/// of the wrong shape becomes the field's empty value.
pub mod lenient {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::de::DeserializeOwned;
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(super::value_text(&value).unwrap_or_default())
    }

    pub fn strings<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(super::string_list(Some(&value)))
    }

    /// Whole number given as a number or a numeric string
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn records<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(d)?;
        Ok(super::record_list(Some(&value)))
    }
}

impl Normalized for Value {
    fn from_object(object: &Map<String, Value>) -> Self {
        Value::Object(object.clone())
    }

    fn fallback(raw: &str) -> Self {
        json!({ "rawResponse": raw })
    }
}
