use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// Named query that lists every row of the table given in its body.
pub const LIST_QUERY: &str = "com.archboard.records";

type Row = Map<String, Value>;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        }
    }

    /// `MOCK_CLIENT_ID` / `MOCK_CLIENT_SECRET`, defaulting to `client`/`secret`.
    pub fn from_env() -> Self {
        let id = std::env::var("MOCK_CLIENT_ID").unwrap_or_else(|_| "client".to_string());
        let secret = std::env::var("MOCK_CLIENT_SECRET").unwrap_or_else(|_| "secret".to_string());
        Self::new(&id, &secret)
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("client", "secret")
    }
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    rows: BTreeMap<u64, Row>,
}

#[derive(Debug, Default)]
pub struct AppState {
    credentials: Credentials,
    tokens: RwLock<HashSet<String>>,
    tables: RwLock<HashMap<String, Table>>,
    token_requests: AtomicUsize,
}

impl AppState {
    pub fn new(credentials: Credentials) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            ..Self::default()
        })
    }

    /// Number of successful token exchanges so far.
    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }
}

pub type Db = Arc<AppState>;

pub fn app() -> Router {
    app_with_state(AppState::new(Credentials::default()))
}

pub fn app_with_state(state: Db) -> Router {
    Router::new()
        .route("/oauth/access_token", post(access_token))
        .route("/ws/schema/table/{table}", get(list_records).post(create_record))
        .route("/ws/schema/table/{table}/count", get(count_records))
        .route(
            "/ws/schema/table/{table}/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .route("/ws/schema/query/{name}", post(named_query))
        .route("/ws/dataversion/{app}/{version}", get(data_version))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_state(listener: TcpListener, state: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

// ---------------------------------------------------------------------------
// OAuth
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenGrant {
    grant_type: String,
}

async fn access_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(grant): Form<TokenGrant>,
) -> Response {
    if grant.grant_type != "client_credentials" {
        return error(StatusCode::BAD_REQUEST, "unsupported_grant_type");
    }

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|v| BASE64_STANDARD.decode(v).ok())
        .and_then(|v| String::from_utf8(v).ok());
    let expected = format!("{}:{}", db.credentials.client_id, db.credentials.client_secret);
    if presented.as_deref() != Some(expected.as_str()) {
        tracing::warn!("rejected client credentials");
        return error(StatusCode::UNAUTHORIZED, "invalid_client");
    }

    let n = db.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("mock-token-{n}");
    db.tokens.write().await.insert(token.clone());
    tracing::info!(n, "issued access token");

    Json(json!({
        "access_token": token,
        "token_type": "Bearer",
        "expires_in": "2504956"
    }))
    .into_response()
}

async fn authorize(db: &Db, headers: &HeaderMap) -> Result<(), Response> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(error(StatusCode::UNAUTHORIZED, "invalid_token"));
    };
    if db.tokens.read().await.contains(token) {
        Ok(())
    } else {
        Err(error(StatusCode::UNAUTHORIZED, "invalid_token"))
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

async fn list_records(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    let tables = db.tables.read().await;
    let rows: Vec<Value> = tables
        .get(&table)
        .map(|t| {
            t.rows
                .iter()
                .filter(|(_, row)| matches_filter(row, params.get("q")))
                .map(|(id, row)| render(*id, row, params.get("projection")))
                .collect()
        })
        .unwrap_or_default();

    let page = params.get("page").and_then(|p| p.parse::<usize>().ok()).unwrap_or(1).max(1);
    let size = params.get("pagesize").and_then(|p| p.parse::<usize>().ok());
    let record: Vec<Value> = match size {
        Some(size) if size > 0 => rows.into_iter().skip((page - 1) * size).take(size).collect(),
        _ => rows,
    };

    Json(json!({ "name": table, "record": record })).into_response()
}

async fn count_records(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    let tables = db.tables.read().await;
    let count = tables
        .get(&table)
        .map(|t| t.rows.values().filter(|row| matches_filter(row, params.get("q"))).count())
        .unwrap_or(0);
    Json(json!({ "count": count })).into_response()
}

async fn create_record(
    State(db): State<Db>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(fields): Json<Row>,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    let mut tables = db.tables.write().await;
    let entry = tables.entry(table).or_default();
    entry.next_id += 1;
    let id = entry.next_id;
    entry.rows.insert(id, fields);
    (StatusCode::CREATED, Json(json!({ "id": id, "status": "SUCCESS" }))).into_response()
}

async fn get_record(
    State(db): State<Db>,
    Path((table, id)): Path<(String, u64)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    let tables = db.tables.read().await;
    match tables.get(&table).and_then(|t| t.rows.get(&id)) {
        Some(row) => {
            let mut by_table = Map::new();
            by_table.insert(table.clone(), render(id, row, params.get("projection")));
            Json(json!({ "id": id, "tables": by_table })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "record not found"),
    }
}

async fn update_record(
    State(db): State<Db>,
    Path((table, id)): Path<(String, u64)>,
    headers: HeaderMap,
    Json(fields): Json<Row>,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    let mut tables = db.tables.write().await;
    match tables.get_mut(&table).and_then(|t| t.rows.get_mut(&id)) {
        Some(row) => {
            row.extend(fields);
            Json(json!({ "id": id, "status": "SUCCESS" })).into_response()
        }
        None => error(StatusCode::NOT_FOUND, "record not found"),
    }
}

async fn delete_record(
    State(db): State<Db>,
    Path((table, id)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    let mut tables = db.tables.write().await;
    match tables.get_mut(&table).and_then(|t| t.rows.remove(&id)) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, "record not found"),
    }
}

// ---------------------------------------------------------------------------
// Named queries and data versions
// ---------------------------------------------------------------------------

async fn named_query(
    State(db): State<Db>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    if name != LIST_QUERY {
        return error(StatusCode::NOT_FOUND, "query not found");
    }
    let input: Row = if body.trim().is_empty() {
        Row::new()
    } else {
        match serde_json::from_str(&body) {
            Ok(input) => input,
            Err(_) => return error(StatusCode::BAD_REQUEST, "body must be a JSON object"),
        }
    };
    let Some(table) = input.get("table").and_then(Value::as_str) else {
        return error(StatusCode::BAD_REQUEST, "missing table parameter");
    };

    let tables = db.tables.read().await;
    let mut record: Vec<Value> = tables
        .get(table)
        .map(|t| t.rows.iter().map(|(id, row)| render(*id, row, None)).collect())
        .unwrap_or_default();
    if let Some(size) = params.get("pagesize").and_then(|p| p.parse::<usize>().ok()) {
        record.truncate(size);
    }
    Json(json!({ "name": name, "record": record })).into_response()
}

async fn data_version(
    State(db): State<Db>,
    Path((app, version)): Path<(String, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&db, &headers).await {
        return denied;
    }
    Json(json!({
        "$dataversion": (version + 1).to_string(),
        "$dataversion_applicationname": app,
        "tables": {}
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Supports a single `field==value` expression.
fn matches_filter(row: &Row, q: Option<&String>) -> bool {
    let Some((field, expected)) = q.and_then(|q| q.split_once("==")) else {
        return true;
    };
    match row.get(field) {
        Some(Value::String(s)) => s == expected,
        Some(other) => other.to_string() == expected,
        None => false,
    }
}

fn render(id: u64, row: &Row, projection: Option<&String>) -> Value {
    let wanted: Option<Vec<&str>> = projection
        .filter(|p| p.as_str() != "*")
        .map(|p| p.split(',').map(str::trim).collect());
    let mut out = Map::new();
    out.insert("id".to_string(), json!(id));
    for (key, value) in row {
        if wanted.as_ref().map_or(true, |w| w.contains(&key.as_str())) {
            out.insert(key.clone(), value.clone());
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filter_matches_strings_and_numbers() {
        let r = row(json!({"name": "Ann", "grade": 9}));
        assert!(matches_filter(&r, Some(&"name==Ann".to_string())));
        assert!(matches_filter(&r, Some(&"grade==9".to_string())));
        assert!(!matches_filter(&r, Some(&"grade==10".to_string())));
        assert!(!matches_filter(&r, Some(&"missing==1".to_string())));
        assert!(matches_filter(&r, None));
    }

    #[test]
    fn render_applies_projection() {
        let r = row(json!({"name": "Ann", "grade": 9}));
        assert_eq!(
            render(3, &r, Some(&"name".to_string())),
            json!({"id": 3, "name": "Ann"})
        );
        assert_eq!(
            render(3, &r, Some(&"*".to_string())),
            json!({"id": 3, "name": "Ann", "grade": 9})
        );
    }

    #[test]
    fn credentials_default() {
        let c = Credentials::default();
        assert_eq!(c.client_id, "client");
        assert_eq!(c.client_secret, "secret");
    }
}
