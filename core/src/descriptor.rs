//! The transport-ready request descriptor.
//!
//! A descriptor keeps parameters and body as JSON maps so callers and tests
//! can inspect exactly what the builder assembled. `into_http_request`
//! performs the final encoding into an `HttpRequest`.

use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest};
use crate::query::{encode_query, to_query_string};

#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Normalized endpoint, relative to the base URL.
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub params: Map<String, Value>,
    pub data: Map<String, Value>,
}

impl RequestDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Encode into a wire request against `base_url`.
    ///
    /// GET carries no body, since its data has already been merged into
    /// `params`. DELETE sends its data only when there is some.
    pub fn into_http_request(self, base_url: &str) -> Result<HttpRequest, ApiError> {
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), self.url);
        let pairs = encode_query(&self.params);
        if !pairs.is_empty() {
            url.push('?');
            url.push_str(&to_query_string(&pairs));
        }

        let body = match self.method {
            HttpMethod::Get => None,
            HttpMethod::Delete if self.data.is_empty() => None,
            _ => Some(
                serde_json::to_string(&self.data)
                    .map_err(|e| ApiError::SerializationError(e.to_string()))?,
            ),
        };

        Ok(HttpRequest {
            method: self.method,
            url,
            headers: self.headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(method: HttpMethod, params: Value, data: Value) -> RequestDescriptor {
        RequestDescriptor {
            url: "/ws/schema/table/students".to_string(),
            method,
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            params: params.as_object().cloned().unwrap_or_default(),
            data: data.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn get_encodes_params_and_drops_body() {
        let req = descriptor(
            HttpMethod::Get,
            json!({"projection": "*", "page": 2, "count": true}),
            json!({"ignored": "here"}),
        )
        .into_http_request("https://sis.example.org/")
        .unwrap();
        assert_eq!(
            req.url,
            "https://sis.example.org/ws/schema/table/students?projection=*&page=2&count=1"
        );
        assert!(req.body.is_none());
        assert_eq!(req.header("accept"), Some("application/json"));
    }

    #[test]
    fn post_keeps_native_body_types() {
        let req = descriptor(
            HttpMethod::Post,
            json!({}),
            json!({"grade": 9, "active": true, "name": "Ann"}),
        )
        .into_http_request("https://sis.example.org")
        .unwrap();
        assert_eq!(req.url, "https://sis.example.org/ws/schema/table/students");
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"grade": 9, "active": true, "name": "Ann"}));
    }

    #[test]
    fn delete_without_data_has_no_body() {
        let req = descriptor(HttpMethod::Delete, json!({}), json!({}))
            .into_http_request("https://sis.example.org")
            .unwrap();
        assert!(req.body.is_none());
        assert_eq!(req.method, HttpMethod::Delete);
    }

    #[test]
    fn delete_keeps_data_as_body() {
        let req = descriptor(HttpMethod::Delete, json!({}), json!({"reason": "dup"}))
            .into_http_request("http://h")
            .unwrap();
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.body.as_deref(), Some(r#"{"reason":"dup"}"#));
    }
}
