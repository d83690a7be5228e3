//! Decoding of API-gateway response envelopes.
//!
//! Proxy integrations may hand back the payload in several shapes:
//!
//! * the object itself: `{"executionArn": "..."}`
//! * the object serialized into a JSON string: `"{\"executionArn\": \"...\"}"`
//! * the object nested under `body`, either as an object or as a string,
//!   up to two levels deep: `{"body": "{\"body\": {...}}"}`
//!
//! [`unwrap_layers`] peels these layers in a fixed order and
//! [`find_string`] returns the first non-empty value found.

use serde_json::Value;

/// Maximum number of nested `body` envelopes that are unwrapped.
pub const MAX_BODY_DEPTH: usize = 2;

/// Where in the envelope a value was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// Field present on the top-level object.
    Direct,
    /// Top-level value was a JSON string holding the object.
    Encoded,
    /// Field found under `depth` levels of `body`.
    Body(usize),
}

/// Parses a JSON string value into the value it encodes. Non-string values,
/// or strings that are not JSON, are returned unchanged.
fn decode_string(value: Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(inner) => inner,
            Err(_) => Value::String(s),
        },
        other => other,
    }
}

/// Returns each candidate payload in priority order, tagged with its layer.
pub fn unwrap_layers(root: &Value) -> Vec<(Layer, Value)> {
    let mut layers = Vec::with_capacity(MAX_BODY_DEPTH + 2);
    layers.push((Layer::Direct, root.clone()));

    let mut current = root.clone();
    if current.is_string() {
        current = decode_string(current);
        layers.push((Layer::Encoded, current.clone()));
    }

    for depth in 1..=MAX_BODY_DEPTH {
        let Some(body) = current.get("body") else {
            break;
        };
        current = decode_string(body.clone());
        layers.push((Layer::Body(depth), current.clone()));
    }

    layers
}

/// Parses raw response text, tolerating bodies that are not JSON at all.
pub fn parse_body(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// First non-empty string field among `fields`, checking every layer in order.
pub fn find_string(root: &Value, fields: &[&str]) -> Option<(Layer, String)> {
    unwrap_layers(root).into_iter().find_map(|(layer, value)| {
        fields
            .iter()
            .find_map(|field| non_empty_str(&value, field))
            .map(|s| (layer, s.to_string()))
    })
}
