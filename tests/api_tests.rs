//! HTTP API tests against the SQLite store.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use bujo_migrate::clock::FixedClock;
use bujo_migrate::config::Config;
use bujo_migrate::db::Database;
use bujo_migrate::server::{AppState, USER_HEADER, build_router};
use bujo_migrate::storage::JournalStore;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn setup_app() -> Router {
    setup_app_with(Config::default())
}

fn setup_app_with(config: Config) -> Router {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let store: Arc<dyn JournalStore> = Arc::new(db);
    let clock = Arc::new(FixedClock::on(
        NaiveDate::from_ymd_opt(2025, 10, 23).unwrap(),
    ));
    build_router(AppState::new(store, config, clock))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, Some("ana"), method, uri, body).await
}

async fn send_as(
    app: &Router,
    user: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn add(app: &Router, body: Value) -> String {
    let (status, created) = send(app, "POST", "/api/entries", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    created["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn entry_crud() {
    let app = setup_app();
    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-23", "content": "write report"}),
    )
    .await;

    let (status, entry) = send(&app, "GET", &format!("/api/entries/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["state"], "incomplete");
    assert_eq!(entry["lineage_id"], id.as_str());

    let (status, entry) = send(
        &app,
        "PATCH",
        &format!("/api/entries/{}", id),
        Some(json!({"content": "write the report"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["content"], "write the report");
    assert_eq!(entry["migration_count"], 0);

    let (status, _) = send(&app, "DELETE", &format!("/api/entries/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/api/entries/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_fields_are_unprocessable() {
    let app = setup_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/entries",
        Some(json!({"entry_type": "task", "date": "2025-10-23", "content": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_FIELD");
    assert_eq!(body["field"], "content");

    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-23", "content": "counted"}),
    )
    .await;
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/entries/{}", id),
        Some(json!({"migration_count": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "migration_count");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/tasks/{}/schedule", id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "target_date");
}

#[tokio::test]
async fn views_group_and_filter() {
    let app = setup_app();
    add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-23", "content": "call plumber"}),
    )
    .await;
    add(
        &app,
        json!({"entry_type": "note", "date": "2025-10-23", "content": "plumber number in wallet"}),
    )
    .await;
    add(
        &app,
        json!({"entry_type": "event", "date": "2025-10-23", "content": "standup"}),
    )
    .await;
    add(
        &app,
        json!({"entry_type": "task", "date": "2025-12-02", "content": "renew passport"}),
    )
    .await;

    let (status, view) = send(&app, "GET", "/api/views/daily", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["date"], "2025-10-23");
    assert_eq!(view["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(view["events"][0]["event_state"], "upcoming");
    assert_eq!(view["notes"].as_array().unwrap().len(), 1);

    let (_, view) = send(&app, "GET", "/api/views/daily?search=plumber", None).await;
    assert_eq!(view["tasks"].as_array().unwrap().len(), 1);
    assert_eq!(view["events"].as_array().unwrap().len(), 0);
    assert_eq!(view["notes"].as_array().unwrap().len(), 1);

    let (_, rows) = send(&app, "GET", "/api/views/monthly?month=2025-12", None).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["content"], "renew passport");

    let (status, future) = send(&app, "GET", "/api/views/future?year=2025", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(future["months"].as_array().unwrap().len(), 12);
    assert_eq!(future["entries"].as_array().unwrap().len(), 4);

    let (status, _) = send(&app, "GET", "/api/views/monthly?month=2025-13", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn lineage_and_stats_follow_transitions() {
    let app = setup_app();
    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-20", "content": "file taxes"}),
    )
    .await;

    let (status, first) = send(
        &app,
        "POST",
        &format!("/api/tasks/{}/migrate", id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["date"], "2025-10-21");

    let second_id = first["id"].as_str().unwrap();
    let (status, second) = send(
        &app,
        "POST",
        &format!("/api/tasks/{}/schedule", second_id),
        Some(json!({"target_date": "2025-11-15"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["migration_count"], 2);

    let (_, lineage) = send(&app, "GET", &format!("/api/lineage/{}", id), None).await;
    assert_eq!(lineage["rows"].as_array().unwrap().len(), 3);
    assert_eq!(lineage["records"].as_array().unwrap().len(), 2);

    let (_, stats) = send(&app, "GET", "/api/stats", None).await;
    assert_eq!(stats["total_migrations"], 2);
    assert_eq!(stats["migrated"], 1);
    assert_eq!(stats["scheduled"], 1);
    assert_eq!(stats["cancelled"], 0);
}

#[tokio::test]
async fn strict_mode_rejects_migrating_a_completed_task() {
    let mut config = Config::default();
    config.journal.strict_transitions = true;
    let app = setup_app_with(config);
    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-20", "content": "done already"}),
    )
    .await;
    send(&app, "POST", &format!("/api/tasks/{}/complete", id), None).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/tasks/{}/migrate", id),
        Some(json!({"target_date": "2025-10-30"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn cancel_and_reactivate() {
    let app = setup_app();
    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-22", "content": "maybe later"}),
    )
    .await;

    let (status, entry) = send(
        &app,
        "POST",
        &format!("/api/tasks/{}/cancel", id),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["state"], "cancelled");

    let (_, history) = send(&app, "GET", &format!("/api/history/{}", id), None).await;
    assert_eq!(history[0]["migration_type"], "cancel");
    assert_eq!(history[0]["migrated_to_date"], Value::Null);

    let (status, entry) = send(&app, "POST", &format!("/api/tasks/{}/reactivate", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["state"], "incomplete");

    let (_, entry) = send(&app, "POST", &format!("/api/tasks/{}/complete", id), None).await;
    assert_eq!(entry["state"], "complete");
    let (_, entry) = send(&app, "POST", &format!("/api/tasks/{}/complete", id), None).await;
    assert_eq!(entry["state"], "incomplete");
}

#[tokio::test]
async fn repair_on_a_consistent_journal_finds_nothing() {
    let app = setup_app();
    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-20", "content": "tidy"}),
    )
    .await;
    send(
        &app,
        "POST",
        &format!("/api/tasks/{}/migrate", id),
        Some(json!({"target_date": "2025-10-23"})),
    )
    .await;

    let (status, body) = send(&app, "POST", "/api/repair", Some(json!({"apply": true}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["findings"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn transitions_accept_an_empty_body() {
    let app = setup_app();
    let id = add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-22", "content": "no body"}),
    )
    .await;

    let (status, spawned) = send(&app, "POST", &format!("/api/tasks/{}/migrate", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(spawned["date"], "2025-10-23");

    let next = spawned["id"].as_str().unwrap();
    let (status, entry) = send(&app, "POST", &format!("/api/tasks/{}/cancel", next), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["state"], "cancelled");

    let (status, body) = send(&app, "POST", &format!("/api/tasks/{}/schedule", id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "target_date");

    let (status, body) = send(&app, "POST", "/api/repair", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"], Value::Null);
}

#[tokio::test]
async fn workflow_sessions_require_a_user() {
    let app = setup_app();
    add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-20", "content": "stale"}),
    )
    .await;
    let (status, _) = send(&app, "POST", "/api/catch-up", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "POST", "/api/wizard", Some(json!({"month": "2025-10"}))).await;
    assert_eq!(status, StatusCode::OK);

    for (method, uri, body) in [
        ("GET", "/api/catch-up", None),
        ("POST", "/api/catch-up/decide", Some(json!({"decision": "keep"}))),
        ("GET", "/api/wizard", None),
        ("POST", "/api/wizard/select", Some(json!({"mode": "all"}))),
        ("POST", "/api/wizard/apply", Some(json!({"action": "cancel"}))),
    ] {
        let (status, body) = send_as(&app, None, method, uri, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["code"], "NOT_AUTHENTICATED");
    }

    // The wizard was not touched by the rejected calls.
    let (_, view) = send(&app, "GET", "/api/wizard", None).await;
    assert_eq!(view["selected"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn workflow_sessions_are_per_user() {
    let app = setup_app();
    add(
        &app,
        json!({"entry_type": "task", "date": "2025-10-20", "content": "ana's task"}),
    )
    .await;
    let (status, view) = send(&app, "POST", "/api/catch-up", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["progress"]["total"], 1);

    let (status, body) = send_as(&app, Some("sam"), "GET", "/api/catch-up", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, view) = send_as(&app, Some("sam"), "POST", "/api/catch-up", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["progress"]["total"], 0);

    let (_, view) = send(&app, "GET", "/api/catch-up", None).await;
    assert_eq!(view["progress"]["total"], 1);
    assert_eq!(view["current"]["task"]["content"], "ana's task");
}
