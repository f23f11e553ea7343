//! Client behavior against an in-process stub transport.
//!
//! # Design
//! `StubTransport` records every request it sees and answers from a small
//! in-memory store, so these tests can assert on exactly what went over the
//! wire (one request per operation, headers, bodies) without sockets.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deta_base::{ApiError, Deta, HttpMethod, HttpRequest, HttpResponse, Transport, Updates};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const ROOT: &str = "https://database.deta.sh/v1/pid/users";

#[derive(Default)]
struct StubTransport {
    requests: Mutex<Vec<HttpRequest>>,
    items: Mutex<BTreeMap<String, Value>>,
    /// Canned reply overriding the store for the next request.
    canned: Mutex<Option<HttpResponse>>,
}

impl StubTransport {
    fn reply_once(&self, status: u16, body: Value) {
        *self.canned.lock().unwrap() = Some(HttpResponse::new(status, body.to_string()));
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, req: &HttpRequest) -> HttpResponse {
        let path = req.url.strip_prefix(ROOT).unwrap_or(&req.url);
        let body: Value = req
            .body
            .as_deref()
            .map(|b| serde_json::from_str(b).unwrap())
            .unwrap_or(Value::Null);
        let mut items = self.items.lock().unwrap();

        match (req.method, path) {
            (HttpMethod::Put, "/items") => {
                for item in body["items"].as_array().unwrap() {
                    let key = item["key"].as_str().unwrap().to_string();
                    items.insert(key, item.clone());
                }
                HttpResponse::new(207, json!({"processed": {"items": body["items"]}}).to_string())
            }
            (HttpMethod::Get, path) => {
                let key = path.trim_start_matches("/items/");
                match items.get(key) {
                    Some(item) => HttpResponse::new(200, item.to_string()),
                    None => HttpResponse::new(404, json!({"key": key}).to_string()),
                }
            }
            (HttpMethod::Post, "/query") => {
                let limit = body["limit"].as_u64().unwrap_or(1000) as usize;
                let after = body["last"].as_str().unwrap_or("");
                let remaining: Vec<&Value> = items
                    .iter()
                    .filter(|(k, _)| k.as_str() > after)
                    .map(|(_, v)| v)
                    .collect();
                let page: Vec<&Value> = remaining.iter().take(limit).copied().collect();
                let mut paging = json!({"size": page.len()});
                if remaining.len() > limit {
                    paging["last"] = page.last().unwrap()["key"].clone();
                }
                HttpResponse::new(200, json!({"paging": paging, "items": page}).to_string())
            }
            _ => HttpResponse::new(200, json!({"ok": true}).to_string()),
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        let canned = self.canned.lock().unwrap().take();
        Ok(canned.unwrap_or_else(|| self.answer(&request)))
    }
}

fn setup() -> (Arc<StubTransport>, Deta) {
    let stub = Arc::new(StubTransport::default());
    let deta = Deta::with_transport("pid", "pid_secret", stub.clone());
    (stub, deta)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    key: String,
    name: String,
    tags: Vec<String>,
}

fn user(key: &str) -> User {
    User {
        key: key.to_string(),
        name: format!("user {key}"),
        tags: vec!["a".to_string()],
    }
}

#[tokio::test]
async fn every_operation_sends_the_same_headers() {
    let (stub, deta) = setup();
    let users = deta.base::<User>("users");

    users.put(&[user("k1")]).await.unwrap();
    users.get("k1").await.unwrap();
    users.delete("k1").await.unwrap();
    users.insert(&user("k2")).await.unwrap();
    users.update("k2", &Updates::new().set("name", "x")).await.unwrap();
    users.query(vec![], None, None).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 6);
    for req in &requests {
        assert_eq!(req.headers, deta.headers().to_vec(), "{} {}", req.method, req.url);
    }
    assert_eq!(
        requests.iter().map(|r| r.method).collect::<Vec<_>>(),
        vec![
            HttpMethod::Put,
            HttpMethod::Get,
            HttpMethod::Delete,
            HttpMethod::Post,
            HttpMethod::Patch,
            HttpMethod::Post,
        ]
    );
}

#[tokio::test]
async fn put_issues_one_request_per_call() {
    let (stub, deta) = setup();
    let users = deta.base::<User>("users");

    users.put(&[]).await.unwrap();
    users.put(&[user("b"), user("a")]).await.unwrap();

    let requests = stub.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].body.as_deref(), Some(r#"{"items":[]}"#));
    let second: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(second["items"][0]["key"], "b");
    assert_eq!(second["items"][1]["key"], "a");
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let (_stub, deta) = setup();
    let users = deta.base::<User>("users");

    users.put(&[user("k1")]).await.unwrap();
    assert_eq!(users.get("k1").await.unwrap(), Some(user("k1")));
}

#[tokio::test]
async fn get_missing_is_none() {
    let (_stub, deta) = setup();
    let users = deta.base::<User>("users");
    assert_eq!(users.get("missing").await.unwrap(), None);
}

#[tokio::test]
async fn insert_conflict_resolves_to_error_json() {
    let (stub, deta) = setup();
    let users = deta.base_json("users");
    stub.reply_once(409, json!({"key": "k1", "errors": ["exists"]}));

    let body = users.insert(&json!({"key": "k1"})).await.unwrap();
    assert_eq!(body, json!({"key": "k1", "errors": ["exists"]}));
}

#[tokio::test]
async fn update_sends_descriptor_verbatim() {
    let (stub, deta) = setup();
    let users = deta.base_json("users");

    users.update("k1", &Updates::new().set("a", 1)).await.unwrap();
    let req = &stub.requests()[0];
    assert_eq!(req.url, format!("{ROOT}/items/k1"));
    assert_eq!(req.body.as_deref(), Some(r#"{"set":{"a":1}}"#));
}

#[tokio::test]
async fn query_body_and_manual_paging() {
    let (stub, deta) = setup();
    let users = deta.base::<User>("users");
    users
        .put(&[user("a"), user("b"), user("c"), user("d"), user("e")])
        .await
        .unwrap();

    let cond = json!({"name?pfx": "user"});
    let first = users.query(vec![cond.clone()], Some(2), None).await.unwrap();
    assert_eq!(first.paging.size, 2);
    assert_eq!(first.next_cursor(), Some("b"));

    let second = users
        .query(vec![cond.clone()], Some(2), first.next_cursor())
        .await
        .unwrap();
    let replay = users
        .query(vec![cond.clone()], Some(2), first.next_cursor())
        .await
        .unwrap();
    assert_eq!(second, replay);
    assert_eq!(second.items, vec![user("c"), user("d")]);

    let third = users
        .query(vec![cond.clone()], Some(2), second.next_cursor())
        .await
        .unwrap();
    assert_eq!(third.items, vec![user("e")]);
    assert_eq!(third.next_cursor(), None);

    let sent: Value = serde_json::from_str(stub.requests()[2].body.as_deref().unwrap()).unwrap();
    assert_eq!(sent, json!({"query": [cond], "limit": 2, "last": "b"}));
}

#[tokio::test]
async fn query_with_limit_and_cursor_body() {
    let (stub, deta) = setup();
    let users = deta.base_json("users");

    users
        .query(vec![json!({"age?gt": 18})], Some(10), Some("abc"))
        .await
        .unwrap();
    assert_eq!(
        stub.requests()[0].body.as_deref(),
        Some(r#"{"query":[{"age?gt":18}],"limit":10,"last":"abc"}"#)
    );
}

#[tokio::test]
async fn concurrent_calls_share_one_client() {
    let (stub, deta) = setup();
    let users = deta.base::<User>("users");
    users.put(&[user("a"), user("b")]).await.unwrap();

    let handles: Vec<_> = ["a", "b", "zz"]
        .into_iter()
        .map(|key| {
            let users = users.clone();
            tokio::spawn(async move { users.get(key).await })
        })
        .collect();

    let mut found = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            found += 1;
        }
    }
    assert_eq!(found, 2);
    assert_eq!(stub.requests().len(), 4);
}
