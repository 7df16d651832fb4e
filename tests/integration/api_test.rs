use crate::helpers::{env_vars, get, json, MemoryCache, TestApp};
use axum::{body::Body, http::Request};
use entity::{tasks, todos};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::json;
use std::sync::{atomic::Ordering, Arc};
use time::OffsetDateTime;
use uuid::Uuid;

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn task(owner: &str) -> tasks::Model {
    let now = OffsetDateTime::now_utc();
    tasks::Model {
        id: Uuid::now_v7(),
        description: "write docs".to_string(),
        created_by: Some(owner.to_string()),
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

#[tokio::test]
async fn test_healthz_reports_alive_and_sets_request_id() {
    let app = TestApp::new(empty_db());

    let (status, headers, body) = app.call(get("/healthz")).await;

    assert_eq!(status, 200);
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(body["meta"]["status"], 200);
    assert_eq!(body["data"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_accepts_post() {
    let app = TestApp::new(empty_db());
    let request = Request::builder()
        .method("POST")
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();

    let (status, _, _) = app.call(request).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_readyz_is_unavailable_when_cache_is_down() {
    let cache = Arc::new(MemoryCache::default());
    cache.down.store(true, Ordering::SeqCst);
    let app = TestApp::with(env_vars(), empty_db(), cache);

    let (status, _, body) = app.call(get("/readyz")).await;

    assert_eq!(status, 503);
    assert_eq!(body["error"]["code"], "service_unavailable");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("failed to ping cache"));
}

#[tokio::test]
async fn test_readyz_ready_when_dependencies_answer() {
    let app = TestApp::new(empty_db());

    let (status, _, body) = app.call(get("/readyz")).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "ready");
}

#[tokio::test]
async fn test_errorz_is_generic_internal_error() {
    let app = TestApp::new(empty_db());

    let (status, _, body) = app.call(get("/errorz")).await;

    assert_eq!(status, 500);
    assert_eq!(body["error"]["code"], "internal_server_error");
    assert_eq!(body["error"]["message"], "An internal error occurred");
}

#[tokio::test]
async fn test_unknown_route_is_enveloped_not_found() {
    let app = TestApp::new(empty_db());

    let (status, _, body) = app.call(get("/nope")).await;

    assert_eq!(status, 404);
    assert_eq!(body["meta"]["status"], 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_invalid_task_id_is_validation_failure() {
    let app = TestApp::new(empty_db());

    let (status, _, body) = app.call(get("/tasks/not-a-uuid")).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(body["error"]["details"]["id"][0], "must be a valid UUID");
}

#[tokio::test]
async fn test_missing_description_is_localized() {
    let app = TestApp::new(empty_db());

    let (status, _, body) = app.call(json("POST", "/tasks", json!({}))).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["details"]["description"][0], "is required");

    let mut request = json("POST", "/tasks", json!({}));
    request
        .headers_mut()
        .insert("accept-language", "id-ID,id;q=0.9".parse().unwrap());
    let (_, _, body) = app.call(request).await;
    assert_eq!(body["error"]["details"]["description"][0], "wajib diisi");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new(empty_db());
    let request = Request::builder()
        .method("POST")
        .uri("/todos")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, _, body) = app.call(request).await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_secured_routes_require_a_bearer_token() {
    let app = TestApp::new(empty_db());

    let (status, _, body) = app.call(get("/secured/tasks")).await;

    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_secured_list_returns_callers_tasks() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![task("alice"), task("alice")]])
        .into_connection();
    let app = TestApp::new(db);

    let mut request = get("/secured/tasks");
    let bearer = app.bearer("alice");
    request
        .headers_mut()
        .insert("authorization", bearer.parse().unwrap());
    let (status, _, body) = app.call(request).await;

    assert_eq!(status, 200);
    assert_eq!(body["meta"]["total"], 2);
    assert_eq!(body["data"][0]["created_by"], "alice");
}

#[tokio::test]
async fn test_secured_get_of_someone_elses_task_is_forbidden() {
    let owned_by_alice = task("alice");
    let id = owned_by_alice.id;
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![owned_by_alice]])
        .into_connection();
    let app = TestApp::new(db);

    let mut request = get(&format!("/secured/tasks/{id}"));
    let bearer = app.bearer("mallory");
    request
        .headers_mut()
        .insert("authorization", bearer.parse().unwrap());
    let (status, _, body) = app.call(request).await;

    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn test_secured_patch_of_someone_elses_task_is_forbidden() {
    let owned_by_alice = task("alice");
    let id = owned_by_alice.id;
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![owned_by_alice]])
        .into_connection();
    let app = TestApp::new(db);

    let mut request = json(
        "PATCH",
        &format!("/secured/tasks/{id}"),
        json!({"description": "hijacked"}),
    );
    let bearer = app.bearer("mallory");
    request
        .headers_mut()
        .insert("authorization", bearer.parse().unwrap());
    let (status, _, body) = app.call(request).await;

    assert_eq!(status, 403);
    assert_eq!(body["error"]["code"], "forbidden");

    // The ownership read is the only statement issued
    let log = app.state.db.clone().into_transaction_log();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn test_todo_delete_confirms_with_message() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let app = TestApp::new(db);
    let request = Request::builder()
        .method("DELETE")
        .uri("/todos/5")
        .body(Body::empty())
        .unwrap();

    let (status, _, body) = app.call(request).await;

    assert_eq!(status, 200);
    assert_eq!(body["meta"]["message"], "deleted");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_todo_create_is_created() {
    let now = OffsetDateTime::now_utc();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![todos::Model {
            id: 1,
            text: "buy milk".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }]])
        .into_connection();
    let app = TestApp::new(db);

    let (status, _, body) = app
        .call(json("POST", "/todos", json!({"text": "buy milk"})))
        .await;

    assert_eq!(status, 201);
    assert_eq!(body["meta"]["status"], 201);
    assert_eq!(body["data"]["id"], 1);
}

#[tokio::test]
async fn test_metrics_route_follows_configuration() {
    let app = TestApp::new(empty_db());
    let (status, _, _) = app.call(get("/metrics")).await;
    assert_eq!(status, 404);

    let mut vars = env_vars();
    vars.insert("OTEL_ENABLED".into(), "true".into());
    vars.insert("OTEL_METRICS_ENABLED".into(), "true".into());
    let app = TestApp::with(vars, empty_db(), Arc::new(MemoryCache::default()));

    app.call(get("/healthz")).await;
    let (status, _, body) = app.call(get("/metrics")).await;

    assert_eq!(status, 200);
    let text = body.as_str().unwrap();
    assert!(text.contains("http_requests_total{status=\"2xx\"}"));
}
