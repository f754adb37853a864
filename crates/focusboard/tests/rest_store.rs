use focusboard::store::{FetchError, RestStore, TaskStore};
use focusboard_core::task::new_task_payload;
use focusboard_protocol::TaskPatch;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_reads_enveloped_records_with_bearer_auth() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/todos"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"_id": "a", "title": "one", "completed": false},
                {"_id": "b", "text": "two", "completed": true},
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", Some("tok".to_owned())).unwrap();
    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].str_field(&["_id"]).as_deref(), Some("a"));
    assert_eq!(records[1].str_field(&["text"]).as_deref(), Some("two"));
}

#[tokio::test]
async fn list_accepts_a_bare_array() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "x"}])))
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();
    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn create_posts_defaults_and_returns_the_echoed_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/todos"))
        .and(body_partial_json(json!({
            "title": "Buy milk",
            "importance": 2,
            "estimatedTime": 40,
            "completed": false,
            "count": 0,
            "aiComfortMessage": "",
            "category": "Home",
            "isFocus": true,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"_id": "n1", "title": "Buy milk", "category": "Home"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();
    let record = store
        .create(&new_task_payload("Buy milk", "Home", true))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.str_field(&["_id"]).as_deref(), Some("n1"));
}

#[tokio::test]
async fn create_without_a_body_is_accepted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/todos"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();
    let record = store
        .create(&new_task_payload("x", "", false))
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn update_puts_only_the_changed_field() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/todos/abc"))
        .and(body_json(json!({"completed": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"_id": "abc", "completed": true}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/todos/abc"))
        .and(body_json(json!({"title": "renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();
    let echoed = store.update("abc", &TaskPatch::completed()).await.unwrap();
    assert_eq!(echoed.unwrap().bool_field("completed"), Some(true));

    let echoed = store
        .update("abc", &TaskPatch::title("renamed"))
        .await
        .unwrap();
    assert!(echoed.is_none());
}

#[tokio::test]
async fn delete_accepts_no_content() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/todos/abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();
    store.delete("abc").await.unwrap();
}

#[tokio::test]
async fn error_status_carries_the_body_or_reason() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/todos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/todos/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such todo"))
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();

    match store.list().await.unwrap_err() {
        FetchError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "Internal Server Error");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = store.delete("missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("no such todo"));
}

#[tokio::test]
async fn non_json_success_body_is_a_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let store = RestStore::new(&server.uri(), "/api/todos", None).unwrap();
    assert!(matches!(
        store.list().await.unwrap_err(),
        FetchError::Decode(_)
    ));
}

#[tokio::test]
async fn rest_store_has_no_subscription() {
    let store = RestStore::new("http://localhost:5000", "/api/todos", None).unwrap();
    assert!(store.subscribe().await.unwrap().is_none());
}
