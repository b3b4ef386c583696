//! Integration tests for forma-server HTTP endpoints
//!
//! Every test builds its own router over a private in-memory database and
//! drives it with `oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use forma_server::{build_router, db, AppState};
use serde_json::{json, Value};
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: fresh app with the given long-poll hold time
async fn setup_app(longpoll_timeout: Duration) -> (Router, AppState) {
    let pool = db::init_memory_database()
        .await
        .expect("Should open in-memory database");
    let state = AppState::new(pool, longpoll_timeout);
    (build_router(state.clone()), state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, extract_json(response.into_body()).await)
}

fn survey() -> Value {
    json!({
        "title": "Team survey",
        "fields": [
            {"id": "mood", "label": "Mood", "type": "rating", "scale": 5, "required": true},
            {"id": "tags", "label": "Tags", "type": "checkboxes", "options": ["A", "B"], "minChecked": 1},
            {"id": "color", "label": "Color", "type": "multipleChoice", "options": ["Red", "Blue"]},
            {"id": "note", "label": "Note", "type": "text", "maxLength": 50}
        ]
    })
}

async fn create_survey(app: &Router) -> String {
    let (status, body) = call(app, send_json("POST", "/api/forms", survey())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().expect("form id").to_string()
}

async fn submit(app: &Router, form_id: &str, answers: Value) -> (StatusCode, Value) {
    call(
        app,
        send_json(
            "POST",
            &format!("/api/forms/{}/responses", form_id),
            json!({ "answers": answers }),
        ),
    )
    .await
}

// =============================================================================
// Health and forms
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let (status, body) = call(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "forma-server");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_create_and_fetch_form() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let form_id = create_survey(&app).await;

    let (status, body) = call(&app, get(&format!("/api/forms/{}", form_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Team survey");
    assert_eq!(body["fields"].as_array().map(Vec::len), Some(4));
    assert_eq!(body["fields"][0]["type"], "rating");
    assert_eq!(body["responseCount"], 0);
    assert_eq!(body["lastResponseMs"], Value::Null);
}

#[tokio::test]
async fn test_create_form_rejects_bad_schema() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;

    let (status, body) = call(
        &app,
        send_json(
            "POST",
            "/api/forms",
            json!({
                "title": "Broken",
                "fields": [{"id": "r", "label": "R", "type": "rating", "scale": 20}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, _) = call(
        &app,
        send_json("POST", "/api/forms", json!({"title": "", "fields": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_form() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let form_id = create_survey(&app).await;

    let (status, body) = call(
        &app,
        send_json(
            "PUT",
            &format!("/api/forms/{}", form_id),
            json!({
                "title": "Renamed",
                "fields": [{"id": "note", "label": "Note", "type": "text"}]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Renamed");
    assert_eq!(body["fields"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_unknown_form_is_404() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;

    for uri in [
        "/api/forms/missing",
        "/api/forms/missing/responses",
        "/api/forms/missing/analytics",
        "/api/forms/missing/analytics/longpoll?sinceMs=0",
        "/analytics?formId=missing",
        "/analytics/longpoll?formId=missing&sinceMs=0",
    ] {
        let (status, body) = call(&app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = submit(&app, "missing", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Submissions
// =============================================================================

#[tokio::test]
async fn test_submit_validation_errors() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let form_id = create_survey(&app).await;

    let (status, body) = submit(
        &app,
        &form_id,
        json!({"tags": [], "color": "Green", "note": "x".repeat(60)}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "errors": {
                "mood": "Required",
                "tags": "Select at least 1",
                "color": "Invalid option",
                "note": "Max 50 chars"
            }
        })
    );

    // Nothing was stored
    let (_, list) = call(&app, get(&format!("/api/forms/{}/responses", form_id))).await;
    assert_eq!(list["items"], json!([]));
}

#[tokio::test]
async fn test_submit_and_list() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let form_id = create_survey(&app).await;

    let (status, first) = submit(&app, &form_id, json!({"mood": 4, "tags": ["A"]})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["formId"], form_id.as_str());
    assert!(first["submittedAt"].is_i64());

    let (status, _) = submit(&app, &form_id, json!({"mood": 2, "tags": ["B"]})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = call(&app, get(&format!("/api/forms/{}/responses", form_id))).await;
    assert_eq!(status, StatusCode::OK);
    let items = list["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], first["id"]);
    assert!(items[0]["submittedAt"].as_i64() < items[1]["submittedAt"].as_i64());

    let (_, form) = call(&app, get(&format!("/api/forms/{}", form_id))).await;
    assert_eq!(form["responseCount"], 2);
    assert_eq!(form["lastResponseMs"], items[1]["submittedAt"]);
}

// =============================================================================
// Analytics
// =============================================================================

#[tokio::test]
async fn test_analytics_snapshot() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let form_id = create_survey(&app).await;

    for (mood, tags) in [(1, json!(["A"])), (3, json!(["A", "B"])), (5, json!(["B"]))] {
        let (status, _) = submit(&app, &form_id, json!({"mood": mood, "tags": tags})).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&app, get(&format!("/api/forms/{}/analytics", form_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["formId"], form_id.as_str());
    assert_eq!(body["responseCount"], 3);
    assert!(body["lastResponseMs"].is_i64());

    let mood = &body["perField"][0];
    assert_eq!(mood["type"], "rating");
    assert_eq!(mood["average"], 3.0);
    assert_eq!(mood["summary"], "Rating · avg 3.00 / 5");

    let tags = &body["perField"][1];
    assert_eq!(tags["bars"], json!([{"label": "A", "value": 2}, {"label": "B", "value": 2}]));
    assert_eq!(tags["responseN"], 3);

    // Fields nobody answered
    assert_eq!(body["perField"][2]["responseN"], 0);
    assert_eq!(body["perField"][3]["responseN"], 0);

    // Query-style alias returns the same snapshot
    let (_, alias) = call(&app, get(&format!("/analytics?formId={}", form_id))).await;
    assert_eq!(alias, body);
}

#[tokio::test]
async fn test_analytics_alias_requires_form_id() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let (status, body) = call(&app, get("/analytics")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_longpoll_returns_immediately_when_behind() {
    let (app, _) = setup_app(Duration::from_secs(10)).await;
    let form_id = create_survey(&app).await;
    let (_, stored) = submit(&app, &form_id, json!({"mood": 5, "tags": ["A"]})).await;

    let request = get(&format!("/api/forms/{}/analytics/longpoll?sinceMs=0", form_id));
    let (status, body) = tokio::time::timeout(Duration::from_secs(2), call(&app, request))
        .await
        .expect("long-poll should not wait");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseCount"], 1);
    assert_eq!(body["lastResponseMs"], stored["submittedAt"]);
    assert!(body.get("timeout").is_none());
}

#[tokio::test]
async fn test_longpoll_timeout_sentinel() {
    let (app, _) = setup_app(Duration::from_millis(200)).await;
    let form_id = create_survey(&app).await;
    let (_, stored) = submit(&app, &form_id, json!({"mood": 5, "tags": ["A"]})).await;
    let since = stored["submittedAt"].as_i64().expect("submittedAt");

    let (status, body) = call(
        &app,
        get(&format!("/api/forms/{}/analytics/longpoll?sinceMs={}", form_id, since)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"timeout": true, "lastResponseMs": since}));
}

#[tokio::test]
async fn test_longpoll_timeout_on_empty_form() {
    let (app, _) = setup_app(Duration::from_millis(100)).await;
    let form_id = create_survey(&app).await;

    let (_, body) = call(
        &app,
        get(&format!("/analytics/longpoll?formId={}&sinceMs=not-a-number", form_id)),
    )
    .await;
    assert_eq!(body, json!({"timeout": true, "lastResponseMs": null}));
}

#[tokio::test]
async fn test_longpoll_wakes_on_submit() {
    let (app, state) = setup_app(Duration::from_secs(10)).await;
    let form_id = create_survey(&app).await;

    let poller = app.clone();
    let uri = format!("/api/forms/{}/analytics/longpoll?sinceMs=0", form_id);
    let pending = tokio::spawn(async move { call(&poller, get(&uri)).await });

    // Wait until the poll is parked on the hub
    for _ in 0..100 {
        if state.hub.channel_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(state.hub.channel_count(), 1);

    let (_, stored) = submit(&app, &form_id, json!({"mood": 3, "tags": ["B"]})).await;

    let (status, body) = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .expect("long-poll should wake before its hold time")
        .unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["responseCount"], 1);
    assert_eq!(body["lastResponseMs"], stored["submittedAt"]);
    assert_eq!(state.hub.channel_count(), 0);
}

#[tokio::test]
async fn test_cancelled_longpolls_release_channels() {
    let (app, state) = setup_app(Duration::from_secs(10)).await;
    let form_id = create_survey(&app).await;
    let uri = format!("/api/forms/{}/analytics/longpoll?sinceMs=0", form_id);

    for _ in 0..50 {
        let _ = tokio::time::timeout(Duration::from_millis(5), call(&app, get(&uri))).await;
    }

    assert_eq!(state.hub.channel_count(), 0);
}

#[tokio::test]
async fn test_analytics_follow_schema_update() {
    let (app, _) = setup_app(Duration::from_secs(1)).await;
    let form_id = create_survey(&app).await;
    submit(&app, &form_id, json!({"mood": 4, "tags": ["A"], "color": "Red"})).await;

    let (_, before) = call(&app, get(&format!("/api/forms/{}/analytics", form_id))).await;
    assert_eq!(before["perField"].as_array().map(Vec::len), Some(4));

    call(
        &app,
        send_json(
            "PUT",
            &format!("/api/forms/{}", form_id),
            json!({
                "title": "Colors only",
                "fields": [{"id": "color", "label": "Color", "type": "multipleChoice", "options": ["Red", "Blue"]}]
            }),
        ),
    )
    .await;

    let (_, after) = call(&app, get(&format!("/api/forms/{}/analytics", form_id))).await;
    assert_eq!(after["perField"].as_array().map(Vec::len), Some(1));
    assert_eq!(after["perField"][0]["bars"][0], json!({"label": "Red", "value": 1}));
    assert_eq!(after["responseCount"], 1);
}
