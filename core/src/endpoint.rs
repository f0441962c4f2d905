//! Endpoint normalization and the table/record heuristics.
//!
//! # Design
//! `derive_from_endpoint` is a pure function: the builder calls it every
//! time an endpoint is set and copies all derived fields at once, so table
//! name, record id, projection default and page key never disagree with the
//! endpoint they came from.

/// Root of every table resource.
pub const TABLE_PATH_PREFIX: &str = "/ws/schema/table";
/// Root of every named query.
pub const NAMED_QUERY_PREFIX: &str = "/ws/schema/query";
/// Root of data-version subscriptions.
pub const DATA_VERSION_PREFIX: &str = "/ws/dataversion";
/// Client-credentials token exchange.
pub const TOKEN_PATH: &str = "/oauth/access_token";
/// Key under which table and query responses list their records.
pub const RECORD_PAGE_KEY: &str = "record";

/// Everything the builder derives from an endpoint path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointInfo {
    pub endpoint: String,
    pub table_name: Option<String>,
    pub record_id: Option<u64>,
    pub projection_default: bool,
    pub page_key: String,
}

/// Collapse repeated slashes and strip a trailing slash.
pub fn normalize_endpoint(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_slash = false;
    for c in path.chars() {
        let is_slash = c == '/';
        if !(is_slash && previous_slash) {
            out.push(c);
        }
        previous_slash = is_slash;
    }
    if out.ends_with('/') {
        out.pop();
    }
    out
}

pub fn derive_from_endpoint(path: &str) -> EndpointInfo {
    let endpoint = normalize_endpoint(path);
    let segments: Vec<&str> = endpoint.split('/').filter(|s| !s.is_empty()).collect();
    let last = segments.last().copied();
    let record_id = last.and_then(|s| s.parse::<u64>().ok());

    let is_table = endpoint.contains(TABLE_PATH_PREFIX);
    let table_name = if !is_table {
        None
    } else if record_id.is_some() {
        segments.len().checked_sub(2).map(|i| segments[i].to_string())
    } else {
        last.map(str::to_string)
    };

    let page_key = if is_table || endpoint.contains(NAMED_QUERY_PREFIX) {
        RECORD_PAGE_KEY.to_string()
    } else {
        last.unwrap_or_default().to_string()
    };

    EndpointInfo {
        table_name,
        record_id,
        projection_default: is_table,
        page_key,
        endpoint,
    }
}

/// Full path for a table, accepting either a bare name or a table path.
pub fn table_path(name: &str) -> String {
    if name.starts_with(TABLE_PATH_PREFIX) {
        name.to_string()
    } else {
        format!("{TABLE_PATH_PREFIX}/{name}")
    }
}

/// Full path for a named query, accepting either a bare name or a query path.
pub fn named_query_path(name: &str) -> String {
    if name.starts_with(NAMED_QUERY_PREFIX) {
        name.to_string()
    } else {
        format!("{NAMED_QUERY_PREFIX}/{name}")
    }
}

pub fn data_version_path(application_name: &str, version: u64) -> String {
    format!("{DATA_VERSION_PREFIX}/{application_name}/{version}")
}
