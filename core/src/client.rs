//! Stateful request builder for the archboard REST API.
//!
//! # Design
//! `RequestBuilder` holds the connection identity, the access token and one
//! pending request. Configuration methods mutate the pending request and
//! return `&mut Self` for chaining; terminal methods (`send`, `get`, `post`,
//! ...) dispatch it and always reset the pending request afterwards, keeping
//! the token. The builder is meant for one caller at a time: configure,
//! send, repeat.
//!
//! Endpoint-derived fields (table name, record id, projection default, page
//! key) come from `endpoint::derive_from_endpoint` and are only ever written
//! together by `set_endpoint`.

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::endpoint::{
    data_version_path, derive_from_endpoint, named_query_path, table_path, RECORD_PAGE_KEY,
    TOKEN_PATH,
};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, Transport, UreqTransport};
use crate::query::parse_query_string;
use crate::response::ResponsePayload;
use crate::value::FieldList;

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded;charset=UTF-8";

/// The request currently being configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestConfig {
    pub endpoint: Option<String>,
    pub method: HttpMethod,
    pub table_name: Option<String>,
    pub record_id: Option<u64>,
    pub include_projection: bool,
    pub body: Map<String, Value>,
    pub query_params: Map<String, Value>,
    pub page_key: String,
}

/// Query parameters given either as a map or as an encoded query string.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Map(Map<String, Value>),
    Encoded(String),
}

impl From<Map<String, Value>> for QueryInput {
    fn from(map: Map<String, Value>) -> Self {
        QueryInput::Map(map)
    }
}

impl From<&str> for QueryInput {
    fn from(query: &str) -> Self {
        QueryInput::Encoded(query.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(query: String) -> Self {
        QueryInput::Encoded(query)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

pub struct RequestBuilder<T = UreqTransport> {
    base_url: String,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
    transport: T,
    pending: RequestConfig,
}

impl<T> std::fmt::Debug for RequestBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("has_token", &self.access_token.is_some())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> RequestBuilder<T> {
    pub fn new(base_url: &str, client_id: &str, client_secret: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            access_token: None,
            transport,
            pending: RequestConfig::default(),
        }
    }

    pub fn from_config(config: ClientConfig, transport: T) -> Self {
        Self::new(
            &config.base_url,
            &config.client_id,
            &config.client_secret,
            transport,
        )
    }

    /// Seed a token obtained earlier so the first send skips the exchange.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn pending(&self) -> &RequestConfig {
        &self.pending
    }

    pub fn page_key(&self) -> &str {
        &self.pending.page_key
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // ---------------------------------------------------------------------
    // Token
    // ---------------------------------------------------------------------

    /// Run the client-credentials exchange unless a token is held.
    ///
    /// With `force`, the exchange runs regardless. On failure the previous
    /// token (if any) is left untouched.
    pub fn retrieve_token(&mut self, force: bool) -> Result<(), ApiError> {
        if self.access_token.is_some() && !force {
            debug!("reusing access token");
            return Ok(());
        }

        let request = self.token_request();
        info!(url = %request.url, "requesting access token");

        let response = self.transport.execute(&request).map_err(|e| {
            warn!(error = %e, "token exchange failed");
            ApiError::Authentication(e.to_string())
        })?;

        if !response.is_success() {
            warn!(status = response.status, "token endpoint rejected credentials");
            return Err(ApiError::Authentication(format!(
                "token endpoint returned HTTP {}: {}",
                response.status, response.body
            )));
        }

        let token = serde_json::from_str::<TokenResponse>(&response.body)
            .map_err(|e| ApiError::Authentication(format!("malformed token response: {e}")))?
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::Authentication("token response has no access_token".to_string())
            })?;

        self.access_token = Some(token);
        info!("access token acquired");
        Ok(())
    }

    fn token_request(&self) -> HttpRequest {
        let credentials =
            BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}{}", self.base_url, TOKEN_PATH),
            headers: vec![
                ("Authorization".to_string(), format!("Basic {credentials}")),
                ("Content-Type".to_string(), FORM.to_string()),
                ("Accept".to_string(), JSON.to_string()),
            ],
            body: Some("grant_type=client_credentials".to_string()),
        }
    }

    // ---------------------------------------------------------------------
    // Endpoint
    // ---------------------------------------------------------------------

    /// Target a table by bare name or by full table path.
    pub fn set_table(&mut self, name: &str) -> &mut Self {
        self.set_endpoint(&table_path(name));
        self.pending.include_projection = true;
        self.pending.page_key = RECORD_PAGE_KEY.to_string();
        self
    }

    /// Set the endpoint and re-derive table name, record id, projection
    /// default and page key from it.
    pub fn set_endpoint(&mut self, path: &str) -> &mut Self {
        let info = derive_from_endpoint(path);
        self.pending.endpoint = Some(info.endpoint);
        self.pending.table_name = info.table_name;
        self.pending.record_id = info.record_id;
        self.pending.include_projection = info.projection_default;
        self.pending.page_key = info.page_key;
        self
    }

    pub fn to(&mut self, path: &str) -> &mut Self {
        self.set_endpoint(path)
    }

    /// Append `/<id>` to the current endpoint.
    ///
    /// Expects an endpoint to be set already; otherwise the result is `/<id>`.
    pub fn set_id(&mut self, id: u64) -> &mut Self {
        let path = format!("{}/{id}", self.pending.endpoint.as_deref().unwrap_or_default());
        self.set_endpoint(&path)
    }

    pub fn for_id(&mut self, id: u64) -> &mut Self {
        self.set_id(id)
    }

    /// Target a named query; the method becomes POST.
    pub fn set_named_query(&mut self, name: &str, body: Option<Map<String, Value>>) -> &mut Self {
        self.set_endpoint(&named_query_path(name));
        self.pending.method = HttpMethod::Post;
        self.pending.page_key = RECORD_PAGE_KEY.to_string();
        if let Some(body) = body.filter(|b| !b.is_empty()) {
            self.set_data(body);
        }
        self
    }

    /// Target `/ws/dataversion/{application_name}/{version}` with GET.
    pub fn data_subscription(&mut self, application_name: &str, version: u64) -> &mut Self {
        self.set_endpoint(&data_version_path(application_name, version));
        self.pending.method = HttpMethod::Get;
        self
    }

    pub fn set_method(&mut self, method: HttpMethod) -> &mut Self {
        self.pending.method = method;
        self
    }

    // ---------------------------------------------------------------------
    // Body and parameters
    // ---------------------------------------------------------------------

    pub fn set_data(&mut self, body: Map<String, Value>) -> &mut Self {
        self.pending.body = body;
        self
    }

    pub fn set_data_item(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.pending.body.insert(key.into(), value.into());
        self
    }

    /// Replace all query parameters. Strings are decoded first.
    pub fn with_query_params(&mut self, params: impl Into<QueryInput>) -> &mut Self {
        self.pending.query_params = match params.into() {
            QueryInput::Map(map) => map,
            QueryInput::Encoded(query) => parse_query_string(&query),
        };
        self
    }

    pub fn add_query_param(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.pending.query_params.insert(key.into(), value.into());
        self
    }

    /// Server-side query expression (`q`).
    pub fn q(&mut self, expression: &str) -> &mut Self {
        self.add_query_param("q", expression)
    }

    pub fn query_expression(&mut self, expression: &str) -> &mut Self {
        self.q(expression)
    }

    /// Ad-hoc filter (`$q`).
    pub fn filter(&mut self, expression: &str) -> &mut Self {
        self.add_query_param("$q", expression)
    }

    pub fn ad_hoc_filter(&mut self, expression: &str) -> &mut Self {
        self.filter(expression)
    }

    pub fn projection(&mut self, fields: impl Into<FieldList>) -> &mut Self {
        self.add_query_param("projection", fields.into().joined())
    }

    pub fn page(&mut self, page: u32) -> &mut Self {
        self.add_query_param("page", page)
    }

    pub fn page_size(&mut self, size: u32) -> &mut Self {
        self.add_query_param("pagesize", size)
    }

    pub fn sort(&mut self, columns: impl Into<FieldList>, descending: bool) -> &mut Self {
        self.add_query_param("sort", columns.into().joined());
        self.add_query_param("sortdescending", if descending { "true" } else { "false" })
    }

    pub fn order(&mut self, expression: &str) -> &mut Self {
        self.add_query_param("order", expression)
    }

    pub fn ad_hoc_order(&mut self, expression: &str) -> &mut Self {
        self.order(expression)
    }

    pub fn include_count(&mut self) -> &mut Self {
        self.add_query_param("count", "true")
    }

    pub fn expansions(&mut self, expansions: impl Into<FieldList>) -> &mut Self {
        self.add_query_param("expansions", expansions.into().joined())
    }

    pub fn extensions(&mut self, extensions: impl Into<FieldList>) -> &mut Self {
        self.add_query_param("extensions", extensions.into().joined())
    }

    /// Ask for changes since `version` for a registered application.
    pub fn data_version(&mut self, version: u64, application_name: &str) -> &mut Self {
        self.set_data_item("$dataversion", version);
        self.set_data_item("$dataversion_applicationname", application_name)
    }

    pub fn exclude_projection(&mut self) -> &mut Self {
        self.pending.include_projection = false;
        self
    }

    pub fn include_projection(&mut self) -> &mut Self {
        self.pending.include_projection = true;
        self
    }

    // ---------------------------------------------------------------------
    // Assembly
    // ---------------------------------------------------------------------

    /// Merge projection default, GET body and explicit query parameters, in
    /// that order; later stages overwrite earlier keys.
    pub fn build_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if self.pending.include_projection {
            params.insert("projection".to_string(), Value::from("*"));
        }
        if self.pending.method == HttpMethod::Get {
            for (key, value) in &self.pending.body {
                params.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &self.pending.query_params {
            params.insert(key.clone(), value.clone());
        }
        params
    }

    pub fn get_request_descriptor(&self) -> RequestDescriptor {
        let mut headers = Vec::with_capacity(3);
        if let Some(token) = &self.access_token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers.push(("Accept".to_string(), JSON.to_string()));
        headers.push(("Content-Type".to_string(), JSON.to_string()));

        RequestDescriptor {
            url: self.pending.endpoint.clone().unwrap_or_default(),
            method: self.pending.method,
            headers,
            params: self.build_params(),
            data: self.pending.body.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Terminal operations
    // ---------------------------------------------------------------------

    pub fn get(&mut self, endpoint: Option<&str>) -> Result<ResponsePayload, ApiError> {
        self.dispatch_with(HttpMethod::Get, endpoint, None)
    }

    pub fn delete(&mut self, endpoint: Option<&str>) -> Result<ResponsePayload, ApiError> {
        self.dispatch_with(HttpMethod::Delete, endpoint, None)
    }

    pub fn post(
        &mut self,
        endpoint: Option<&str>,
        body: Option<Map<String, Value>>,
    ) -> Result<ResponsePayload, ApiError> {
        self.dispatch_with(HttpMethod::Post, endpoint, body)
    }

    pub fn put(
        &mut self,
        endpoint: Option<&str>,
        body: Option<Map<String, Value>>,
    ) -> Result<ResponsePayload, ApiError> {
        self.dispatch_with(HttpMethod::Put, endpoint, body)
    }

    pub fn patch(
        &mut self,
        endpoint: Option<&str>,
        body: Option<Map<String, Value>>,
    ) -> Result<ResponsePayload, ApiError> {
        self.dispatch_with(HttpMethod::Patch, endpoint, body)
    }

    /// GET `<endpoint>/count` without a projection.
    pub fn count(&mut self) -> Result<ResponsePayload, ApiError> {
        let path = format!("{}/count", self.pending.endpoint.as_deref().unwrap_or_default());
        self.set_endpoint(&path);
        self.exclude_projection();
        self.pending.method = HttpMethod::Get;
        self.send()
    }

    /// Dispatch the pending request, then reset it whatever the outcome.
    pub fn send(&mut self) -> Result<ResponsePayload, ApiError> {
        let result = self.dispatch();
        self.pending = RequestConfig::default();
        result
    }

    fn dispatch_with(
        &mut self,
        method: HttpMethod,
        endpoint: Option<&str>,
        body: Option<Map<String, Value>>,
    ) -> Result<ResponsePayload, ApiError> {
        if let Some(endpoint) = endpoint {
            self.set_endpoint(endpoint);
        }
        if let Some(body) = body {
            self.set_data(body);
        }
        self.pending.method = method;
        self.send()
    }

    fn dispatch(&mut self) -> Result<ResponsePayload, ApiError> {
        self.retrieve_token(false)?;

        let page_key = self.pending.page_key.clone();
        let descriptor = self.get_request_descriptor();
        debug!(params = ?descriptor.params, "assembled request");
        let request = descriptor.into_http_request(&self.base_url)?;

        info!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(&request).map_err(|e| {
            warn!(error = %e, "request failed");
            ApiError::from(e)
        })?;
        info!(status = response.status, "received response");

        if !response.is_success() {
            warn!(status = response.status, url = %request.url, "non-success response");
            return Err(ApiError::HttpError {
                status: response.status,
                body: response.body,
            });
        }
        ResponsePayload::from_body(&response.body, page_key)
    }
}
