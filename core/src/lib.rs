//! Fluent, authenticated request builder for the archboard REST API.
//!
//! # Overview
//! `RequestBuilder` turns chained configuration ("table X, filter by
//! expression, sorted, page N") into a request descriptor, acquires an OAuth2
//! client-credentials token on first use, and sends the request through a
//! pluggable `Transport`. Responses come back as a `ResponsePayload`.
//!
//! # Design
//! - One builder per logical client; the pending request resets after every
//!   send while the access token is kept.
//! - Endpoint heuristics live in `endpoint` as pure functions.
//! - Body values keep their JSON types; only query-string values are
//!   coerced to strings (`value::cast_value_to_string`).
//! - I/O sits behind `http::Transport`; `UreqTransport` is the blocking
//!   implementation shipped with the crate.

pub mod client;
pub mod config;
pub mod descriptor;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod query;
pub mod response;
pub mod value;

pub use client::{QueryInput, RequestBuilder, RequestConfig};
pub use config::ClientConfig;
pub use descriptor::RequestDescriptor;
pub use endpoint::{derive_from_endpoint, normalize_endpoint, EndpointInfo};
pub use error::{ApiError, ConfigError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError, UreqTransport};
pub use response::ResponsePayload;
pub use value::{cast_value_to_string, cast_values_to_string, FieldList};
