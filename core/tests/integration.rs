//! Full item lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every `Base`
//! operation over real HTTP through the default `UreqTransport`. Validates
//! that request building and response parsing agree with the server's
//! routes and payload shapes.

use deta_base::{Base, Deta, Updates};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    key: String,
    title: String,
    #[serde(default)]
    views: i64,
    #[serde(default)]
    tags: Vec<String>,
}

fn note(key: &str, title: &str) -> Note {
    Note {
        key: key.to_string(),
        title: title.to_string(),
        views: 0,
        tags: Vec::new(),
    }
}

async fn start_server() -> Deta {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));

    Deta::builder("pid", "pid_secret")
        .endpoint(&format!("http://{addr}"))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn item_lifecycle() {
    let deta = start_server().await;
    let notes: Base<Note> = deta.base("notes");

    // Step 1: get on an empty base: None.
    assert_eq!(notes.get("n1").await.unwrap(), None);

    // Step 2: put two notes.
    let put = notes
        .put(&[note("n1", "first"), note("n2", "second")])
        .await
        .unwrap();
    assert_eq!(put["processed"]["items"].as_array().unwrap().len(), 2);

    // Step 3: get round-trips.
    assert_eq!(notes.get("n1").await.unwrap(), Some(note("n1", "first")));

    // Step 4: insert a duplicate: error JSON, not Err.
    let dup = notes.insert(&note("n1", "again")).await.unwrap();
    assert_eq!(dup, json!({"errors": ["Key already exists"]}));

    // Step 5: insert a new note.
    let created = notes.insert(&note("n3", "third")).await.unwrap();
    assert_eq!(created["key"], "n3");

    // Step 6: update with several categories.
    let updates = Updates::new()
        .set("title", "first!")
        .increment("views", 2)
        .append("tags", ["rust"]);
    let updated = notes.update("n1", &updates).await.unwrap();
    assert_eq!(updated["key"], "n1");
    let fetched = notes.get("n1").await.unwrap().unwrap();
    assert_eq!(fetched.title, "first!");
    assert_eq!(fetched.views, 2);
    assert_eq!(fetched.tags, vec!["rust".to_string()]);

    // Step 7: update a missing key: error JSON, not Err.
    let missing = notes.update("ghost", &Updates::new().set("a", 1)).await.unwrap();
    assert_eq!(missing, json!({"errors": ["Key not found"]}));

    // Step 8: page through all notes two at a time.
    let first = notes.query(vec![], Some(2), None).await.unwrap();
    assert_eq!(first.paging.size, 2);
    let last = first.next_cursor().map(str::to_string);
    assert_eq!(last.as_deref(), Some("n2"));
    let second = notes.query(vec![], Some(2), last.as_deref()).await.unwrap();
    assert_eq!(second.items, vec![note("n3", "third")]);
    assert_eq!(second.next_cursor(), None);

    // Step 9: filtered query.
    let hits = notes
        .query(vec![json!({"views?gte": 1})], None, None)
        .await
        .unwrap();
    assert_eq!(hits.items.len(), 1);
    assert_eq!(hits.items[0].key, "n1");

    // Step 10: delete, then get: None; delete again still succeeds.
    assert_eq!(notes.delete("n1").await.unwrap(), json!({"key": "n1"}));
    assert_eq!(notes.get("n1").await.unwrap(), None);
    assert_eq!(notes.delete("n1").await.unwrap(), json!({"key": "n1"}));
}

#[tokio::test(flavor = "multi_thread")]
async fn keys_with_reserved_characters() {
    let deta = start_server().await;
    let files = deta.base_json("files");
    let key = "2024/01 report?.txt";

    files.put(&[json!({"key": key, "size": 3})]).await.unwrap();
    let item = files.get(key).await.unwrap().unwrap();
    assert_eq!(item["size"], 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn bases_are_isolated() {
    let deta = start_server().await;
    let a = deta.base_json("a");
    let b = deta.base_json("b");

    a.put(&[json!({"key": "shared"})]).await.unwrap();
    assert!(a.get("shared").await.unwrap().is_some());
    assert!(b.get("shared").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn non_string_key_lands_in_failed() {
    let deta = start_server().await;
    let base = deta.base_json("misc");

    let reply: Value = base.put(&[json!({"key": 5})]).await.unwrap();
    assert_eq!(reply["failed"]["items"], json!([{"key": 5}]));
}
