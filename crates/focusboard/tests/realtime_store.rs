use std::time::Duration;

use focusboard::store::{FetchError, RealtimeStore, SnapshotResult, Subscription, TaskStore};
use focusboard_core::task::new_task_payload;
use focusboard_protocol::TaskPatch;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sse(events: &[(&str, &str)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
        .collect()
}

async fn recv(sub: &mut Subscription) -> Option<SnapshotResult> {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("subscription stalled")
}

#[tokio::test]
async fn list_turns_child_keys_into_ids() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todos.json"))
        .and(query_param("auth", "tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "-a": {"title": "one", "createdAt": "2026-10-15T08:00:00Z"},
            "-b": {"title": "two", "completed": true},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", Some("tok".to_owned())).unwrap();
    let records = store.list().await.unwrap();
    let mut ids: Vec<String> = records
        .iter()
        .filter_map(|r| r.str_field(&["id"]))
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["-a".to_owned(), "-b".to_owned()]);
}

#[tokio::test]
async fn missing_node_lists_as_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todos.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_stamps_created_at_and_uses_the_push_key() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/todos.json"))
        .and(body_string_contains("\"createdAt\""))
        .and(body_string_contains("\"title\":\"Buy milk\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "-new"})))
        .expect(1)
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    let record = store
        .create(&new_task_payload("Buy milk", "Home", false))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.str_field(&["id"]).as_deref(), Some("-new"));
    assert_eq!(record.str_field(&["title"]).as_deref(), Some("Buy milk"));
    assert!(record.get("createdAt").is_some());
}

#[tokio::test]
async fn create_without_a_push_key_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/todos.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    let err = store
        .create(&new_task_payload("x", "", false))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn update_patches_and_delete_removes_the_child() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/todos/-a.json"))
        .and(body_json(json!({"completed": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"completed": true})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/todos/-a.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .expect(1)
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    assert!(store
        .update("-a", &TaskPatch::completed())
        .await
        .unwrap()
        .is_none());
    store.delete("-a").await.unwrap();
}

#[tokio::test]
async fn subscription_pushes_snapshots_until_cancelled() {
    let server = MockServer::start().await;

    let body = sse(&[
        ("put", r#"{"path":"/","data":{"-a":{"title":"one"}}}"#),
        ("keep-alive", "null"),
        ("patch", r#"{"path":"/-a","data":{"completed":true}}"#),
        ("cancel", "null"),
    ]);
    Mock::given(method("GET"))
        .and(path("/todos.json"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/todos.json"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "-a": {"title": "one", "completed": true},
            "-b": {"title": "two"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    let mut sub = store.subscribe().await.unwrap().unwrap();

    let first = recv(&mut sub).await.unwrap().unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].str_field(&["id"]).as_deref(), Some("-a"));

    let second = recv(&mut sub).await.unwrap().unwrap();
    assert_eq!(second.len(), 2);

    match recv(&mut sub).await.unwrap() {
        Err(FetchError::Stream(reason)) => assert_eq!(reason, "cancel"),
        other => panic!("expected cancel, got {other:?}"),
    }
    assert!(recv(&mut sub).await.is_none());
}

#[tokio::test]
async fn subscription_reports_a_closed_stream() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todos.json"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse(&[("put", r#"{"path":"/","data":null}"#)])),
        )
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    let mut sub = store.subscribe().await.unwrap().unwrap();

    let empty = sub.recv().await.unwrap().unwrap();
    assert!(empty.is_empty());
    match sub.recv().await.unwrap() {
        Err(FetchError::Stream(reason)) => assert!(reason.contains("closed")),
        other => panic!("expected closed stream, got {other:?}"),
    }
}

#[tokio::test]
async fn subscribe_rejects_an_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/todos.json"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Permission denied"))
        .mount(&server)
        .await;

    let store = RealtimeStore::new(&server.uri(), "todos", None).unwrap();
    let err = store.subscribe().await.err().unwrap();
    assert_eq!(err.status(), Some(401));
}
