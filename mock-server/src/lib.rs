//! In-memory stand-in for the Deta Base REST API.
//!
//! Serves `/v1/{project}/{base}/items`, `/items/{key}` and `/query` with the
//! status codes and payload shapes of the real service, so the client can be
//! exercised end to end without network access or credentials. Any
//! non-empty `X-API-Key` is accepted.

pub mod store;

use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::Arc,
};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

use store::{Filter, Updates};

/// Largest batch `PUT /items` accepts.
pub const MAX_PUT_ITEMS: usize = 25;
/// Page size used when a query does not set `limit`.
pub const DEFAULT_QUERY_LIMIT: usize = 1000;

/// Items of one base, ordered by key.
pub type Collection = BTreeMap<String, Value>;

/// Every base of every project, keyed by `(project, base)`.
pub type Db = Arc<RwLock<HashMap<(String, String), Collection>>>;

type Reply = (StatusCode, Json<Value>);

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/v1/{project}/{base}/items", put(put_items).post(insert_item))
        .route(
            "/v1/{project}/{base}/items/{key}",
            get(get_item).delete(delete_item).patch(update_item),
        )
        .route("/v1/{project}/{base}/query", post(query_items))
        .layer(middleware::from_fn(require_api_key))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn errors(status: StatusCode, message: impl Into<String>) -> Reply {
    (status, Json(json!({ "errors": [message.into()] })))
}

async fn require_api_key(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| !v.is_empty());
    if !authorized {
        return errors(StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(request).await
}

async fn put_items(
    State(db): State<Db>,
    Path((project, base)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let Some(items) = body.get("items").and_then(Value::as_array) else {
        return errors(StatusCode::BAD_REQUEST, "Missing items");
    };
    if items.len() > MAX_PUT_ITEMS {
        return errors(StatusCode::BAD_REQUEST, "Too many items");
    }
    debug!(%project, %base, count = items.len(), "put items");

    let mut db = db.write().await;
    let collection = db.entry((project, base)).or_default();
    let mut processed = Vec::new();
    let mut failed = Vec::new();
    for item in items {
        match store::with_key(item.clone()) {
            Some((key, item)) => {
                collection.insert(key, item.clone());
                processed.push(item);
            }
            None => failed.push(item.clone()),
        }
    }

    let mut reply = json!({ "processed": { "items": processed } });
    if !failed.is_empty() {
        reply["failed"] = json!({ "items": failed });
    }
    (StatusCode::MULTI_STATUS, Json(reply))
}

async fn get_item(
    State(db): State<Db>,
    Path((project, base, key)): Path<(String, String, String)>,
) -> Reply {
    debug!(%project, %base, %key, "get item");
    let db = db.read().await;
    match db.get(&(project, base)).and_then(|c| c.get(&key)) {
        Some(item) => (StatusCode::OK, Json(item.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({ "key": key }))),
    }
}

async fn delete_item(
    State(db): State<Db>,
    Path((project, base, key)): Path<(String, String, String)>,
) -> Reply {
    debug!(%project, %base, %key, "delete item");
    if let Some(collection) = db.write().await.get_mut(&(project, base)) {
        collection.remove(&key);
    }
    (StatusCode::OK, Json(json!({ "key": key })))
}

async fn insert_item(
    State(db): State<Db>,
    Path((project, base)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let Some((key, item)) = body.get("item").cloned().and_then(store::with_key) else {
        return errors(StatusCode::BAD_REQUEST, "Bad item");
    };
    debug!(%project, %base, %key, "insert item");

    let mut db = db.write().await;
    let collection = db.entry((project, base)).or_default();
    if collection.contains_key(&key) {
        return errors(StatusCode::CONFLICT, "Key already exists");
    }
    collection.insert(key, item.clone());
    (StatusCode::CREATED, Json(item))
}

async fn update_item(
    State(db): State<Db>,
    Path((project, base, key)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let updates: Updates = match serde_json::from_value(body.clone()) {
        Ok(updates) => updates,
        Err(e) => return errors(StatusCode::BAD_REQUEST, e.to_string()),
    };
    if let Err(message) = updates.validate() {
        return errors(StatusCode::BAD_REQUEST, message);
    }
    debug!(%project, %base, %key, "update item");

    let mut db = db.write().await;
    let Some(stored) = db.get_mut(&(project, base)).and_then(|c| c.get_mut(&key)) else {
        return errors(StatusCode::NOT_FOUND, "Key not found");
    };
    let mut updated = stored.clone();
    if let Err(message) = updates.apply(&mut updated) {
        return errors(StatusCode::BAD_REQUEST, message);
    }
    *stored = updated;

    let mut reply = body;
    if let Value::Object(fields) = &mut reply {
        fields.insert("key".to_string(), Value::String(key));
    }
    (StatusCode::OK, Json(reply))
}

#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(default)]
    query: Vec<Value>,
    limit: Option<usize>,
    last: Option<String>,
}

async fn query_items(
    State(db): State<Db>,
    Path((project, base)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    let body: QueryBody = match serde_json::from_value(body) {
        Ok(body) => body,
        Err(e) => return errors(StatusCode::BAD_REQUEST, e.to_string()),
    };
    let filter = match Filter::parse(&body.query) {
        Ok(filter) => filter,
        Err(message) => return errors(StatusCode::BAD_REQUEST, message),
    };
    let limit = body.limit.filter(|l| *l > 0).unwrap_or(DEFAULT_QUERY_LIMIT);
    debug!(%project, %base, limit, last = ?body.last, "query items");

    let db = db.read().await;
    let (items, last) = match db.get(&(project, base)) {
        Some(collection) => scan(collection, &filter, limit, body.last),
        None => (Vec::new(), None),
    };

    let mut paging = json!({ "size": items.len() });
    if let Some(last) = last {
        paging["last"] = Value::String(last);
    }
    (StatusCode::OK, Json(json!({ "paging": paging, "items": items })))
}

/// Collect up to `limit` matching items after `last`, plus the cursor for
/// the next page when more matches remain.
fn scan(
    collection: &Collection,
    filter: &Filter,
    limit: usize,
    last: Option<String>,
) -> (Vec<Value>, Option<String>) {
    let start = match last {
        Some(last) => Bound::Excluded(last),
        None => Bound::Unbounded,
    };
    let mut matching = collection
        .range((start, Bound::Unbounded))
        .filter(|(_, item)| filter.matches(item));

    let mut items = Vec::new();
    let mut cursor = None;
    for (key, item) in matching.by_ref().take(limit) {
        items.push(item.clone());
        cursor = Some(key.clone());
    }
    let more = matching.next().is_some();
    (items, if more { cursor } else { None })
}
