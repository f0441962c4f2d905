//! Verify endpoint derivation and request assembly against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Request cases list builder steps as `[operation, args...]`. Bodies are
//! compared as parsed JSON so field ordering cannot cause false negatives.

use archboard_core::{
    derive_from_endpoint, normalize_endpoint, HttpMethod, RequestBuilder, UreqTransport,
};
use serde_json::Value;

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "PATCH" => HttpMethod::Patch,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

fn apply(builder: &mut RequestBuilder<UreqTransport>, step: &[Value]) {
    let op = step[0].as_str().unwrap();
    match op {
        "set_table" => {
            builder.set_table(step[1].as_str().unwrap());
        }
        "set_endpoint" | "to" => {
            builder.set_endpoint(step[1].as_str().unwrap());
        }
        "for_id" => {
            builder.for_id(step[1].as_u64().unwrap());
        }
        "page" => {
            builder.page(step[1].as_u64().unwrap() as u32);
        }
        "page_size" => {
            builder.page_size(step[1].as_u64().unwrap() as u32);
        }
        "projection" => {
            builder.projection(strings(&step[1]));
        }
        "sort" => {
            builder.sort(strings(&step[1]), false);
        }
        "filter" => {
            builder.filter(step[1].as_str().unwrap());
        }
        "with_query_params" => {
            builder.with_query_params(step[1].as_str().unwrap());
        }
        "add_query_param" => {
            builder.add_query_param(step[1].as_str().unwrap(), step[2].clone());
        }
        "set_named_query" => {
            builder.set_named_query(step[1].as_str().unwrap(), step[2].as_object().cloned());
        }
        "data_version" => {
            builder.data_version(step[1].as_u64().unwrap(), step[2].as_str().unwrap());
        }
        "set_data_item" => {
            builder.set_data_item(step[1].as_str().unwrap(), step[2].clone());
        }
        "exclude_projection" => {
            builder.exclude_projection();
        }
        "method" => {
            builder.set_method(parse_method(step[1].as_str().unwrap()));
        }
        other => panic!("unknown step: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[test]
fn endpoint_test_vectors() {
    let raw = include_str!("../../test-vectors/endpoints.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = case["input"].as_str().unwrap();
        let expected = &case["expected"];

        let info = derive_from_endpoint(input);
        assert_eq!(info.endpoint, expected["endpoint"].as_str().unwrap(), "{name}: endpoint");
        assert_eq!(
            info.table_name.as_deref(),
            expected["table_name"].as_str(),
            "{name}: table_name"
        );
        assert_eq!(info.record_id, expected["record_id"].as_u64(), "{name}: record_id");
        assert_eq!(
            info.projection_default,
            expected["projection_default"].as_bool().unwrap(),
            "{name}: projection_default"
        );
        assert_eq!(info.page_key, expected["page_key"].as_str().unwrap(), "{name}: page_key");

        assert_eq!(normalize_endpoint(&info.endpoint), info.endpoint, "{name}: idempotent");
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let mut builder = RequestBuilder::new("", "client", "secret", UreqTransport::new())
            .with_access_token("vector-token");

        for step in case["steps"].as_array().unwrap() {
            apply(&mut builder, step.as_array().unwrap());
        }

        let expected = &case["expected_request"];
        let req = builder
            .get_request_descriptor()
            .into_http_request("")
            .unwrap();

        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.header("Authorization"), Some("Bearer vector-token"), "{name}: auth");

        match &expected["body"] {
            Value::Null => assert!(req.body.is_none(), "{name}: body should be None"),
            body => {
                let actual: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(&actual, body, "{name}: body");
            }
        }
    }
}
