//! Wrapper around one parsed response body.

use serde_json::{Map, Value};

use crate::error::ApiError;

/// A response body as a JSON object, in key insertion order.
///
/// Also remembers the page key that was pending when the request was sent,
/// so `records()` can find the record collection without the caller
/// tracking it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePayload {
    body: Map<String, Value>,
    page_key: String,
}

impl ResponsePayload {
    pub fn new(body: Map<String, Value>, page_key: impl Into<String>) -> Self {
        Self {
            body,
            page_key: page_key.into(),
        }
    }

    /// Parse a raw body. Blank bodies wrap an empty mapping.
    pub fn from_body(raw: &str, page_key: impl Into<String>) -> Result<Self, ApiError> {
        if raw.trim().is_empty() {
            return Ok(Self::new(Map::new(), page_key));
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(body)) => Ok(Self::new(body, page_key)),
            Ok(other) => Err(ApiError::DeserializationError(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ApiError::DeserializationError(e.to_string())),
        }
    }

    /// Top-level values in insertion order. Each call starts a fresh pass.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.body.values()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn page_key(&self) -> &str {
        &self.page_key
    }

    /// The array stored under the page key, or an empty slice.
    pub fn records(&self) -> &[Value] {
        self.body
            .get(&self.page_key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.body
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.body
    }
}

impl<'a> IntoIterator for &'a ResponsePayload {
    type Item = &'a Value;
    type IntoIter = serde_json::map::Values<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.body.values()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_follow_insertion_order() {
        let payload =
            ResponsePayload::from_body(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#, "record").unwrap();
        let values: Vec<&Value> = payload.values().collect();
        assert_eq!(values, vec![&json!(1), &json!(2), &json!(3)]);
        // restartable
        assert_eq!(payload.values().count(), 3);
        assert_eq!((&payload).into_iter().next(), Some(&json!(1)));
    }

    #[test]
    fn records_under_page_key() {
        let payload = ResponsePayload::from_body(
            r#"{"name": "students", "record": [{"id": 1}, {"id": 2}]}"#,
            "record",
        )
        .unwrap();
        assert_eq!(payload.records().len(), 2);
        assert_eq!(payload.get("name"), Some(&json!("students")));
    }

    #[test]
    fn records_missing_is_empty() {
        let payload = ResponsePayload::from_body(r#"{"count": 3}"#, "record").unwrap();
        assert!(payload.records().is_empty());
    }

    #[test]
    fn blank_body_is_empty_mapping() {
        let payload = ResponsePayload::from_body("", "record").unwrap();
        assert!(payload.is_empty());
        assert_eq!(payload.values().count(), 0);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = ResponsePayload::from_body("[1,2]", "record").unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
        let err = ResponsePayload::from_body("not json", "record").unwrap_err();
        assert!(matches!(err, ApiError::DeserializationError(_)));
    }
}
