//! Query-string decoding and encoding with bracket-key support.

use serde_json::{Map, Value};

use crate::value::cast_value_to_string;

/// Decode a URL-encoded query string into a parameter map.
///
/// `a[]=1&a[]=2` yields an array, `a[b]=1` a nested map. A repeated plain
/// key keeps its last value. A leading `?` is ignored.
pub fn parse_query_string(input: &str) -> Map<String, Value> {
    let input = input.strip_prefix('?').unwrap_or(input);
    let mut params = Map::new();
    for (key, value) in form_urlencoded::parse(input.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        let (base, segments) = split_key(&key);
        if segments.is_empty() {
            params.insert(base.to_string(), Value::String(value.into_owned()));
        } else {
            let slot = params.entry(base.to_string()).or_insert(Value::Null);
            insert_nested(slot, &segments, value.into_owned());
        }
    }
    params
}

/// Flatten a parameter map into encoded-ready pairs.
///
/// Nested maps become `key[sub]` names; every leaf is coerced with
/// `cast_value_to_string`.
pub fn encode_query(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten(key.clone(), value, &mut pairs);
    }
    pairs
}

/// Serialize pairs as `application/x-www-form-urlencoded`.
pub fn to_query_string(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

fn flatten(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten(format!("{prefix}[{key}]"), nested, pairs);
            }
        }
        other => pairs.push((prefix, cast_value_to_string(other))),
    }
}

/// Split `a[b][]` into `("a", ["b", ""])`. Keys with unbalanced brackets are
/// treated as plain names.
fn split_key(key: &str) -> (&str, Vec<&str>) {
    let open = match key.find('[') {
        Some(0) | None => return (key, Vec::new()),
        Some(open) => open,
    };
    let mut segments = Vec::new();
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let Some(close) = stripped.find(']') else {
            return (key, Vec::new());
        };
        segments.push(&stripped[..close]);
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return (key, Vec::new());
    }
    (&key[..open], segments)
}

fn insert_nested(slot: &mut Value, segments: &[&str], value: String) {
    let Some((segment, rest)) = segments.split_first() else {
        *slot = Value::String(value);
        return;
    };

    if segment.is_empty() {
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        if let Value::Array(items) = slot {
            if rest.is_empty() {
                items.push(Value::String(value));
            } else {
                items.push(Value::Null);
                if let Some(last) = items.last_mut() {
                    insert_nested(last, rest, value);
                }
            }
        }
        return;
    }

    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(map) = slot {
        let child = map.entry(segment.to_string()).or_insert(Value::Null);
        insert_nested(child, rest, value);
    }
}
