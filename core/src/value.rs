//! String coercion for values bound for the query string.
//!
//! Request bodies keep their native JSON types; only parameters that end up
//! in a URL pass through `cast_value_to_string`.

use serde_json::{Map, Value};

/// Render a JSON value the way the API expects it in a query string.
///
/// Booleans become `"1"`/`"0"`, null becomes the empty string and arrays are
/// comma-joined after coercing each element. Objects nested in an array are
/// rendered as compact JSON.
pub fn cast_value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(cast_value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(map) => Value::Object(map.clone()).to_string(),
    }
}

/// Apply `cast_value_to_string` to every entry, recursing into nested maps.
///
/// Nested maps stay maps so that they can still be flattened into bracket
/// keys later.
pub fn cast_values_to_string(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let cast = match value {
                Value::Object(nested) => Value::Object(cast_values_to_string(nested)),
                other => Value::String(cast_value_to_string(other)),
            };
            (key.clone(), cast)
        })
        .collect()
}

/// A column list given either as one string or as several names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldList(Vec<String>);

impl FieldList {
    /// The `*` projection.
    pub fn all() -> Self {
        FieldList(vec!["*".to_string()])
    }

    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}

impl Default for FieldList {
    fn default() -> Self {
        Self::all()
    }
}

impl From<&str> for FieldList {
    fn from(value: &str) -> Self {
        FieldList(vec![value.to_string()])
    }
}

impl From<String> for FieldList {
    fn from(value: String) -> Self {
        FieldList(vec![value])
    }
}

impl From<&String> for FieldList {
    fn from(value: &String) -> Self {
        FieldList(vec![value.clone()])
    }
}

impl<S: Into<String>> From<Vec<S>> for FieldList {
    fn from(values: Vec<S>) -> Self {
        FieldList(values.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for FieldList {
    fn from(values: [S; N]) -> Self {
        FieldList(values.into_iter().map(Into::into).collect())
    }
}

impl From<&[&str]> for FieldList {
    fn from(values: &[&str]) -> Self {
        FieldList(values.iter().map(|v| v.to_string()).collect())
    }
}
