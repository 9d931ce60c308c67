use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use errand_dispatch::api::rest::router;
use errand_dispatch::clock::ManualClock;
use errand_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

// Wednesday 2026-01-07 15:00 UTC unless a test pins its own pickup_time.
fn fixed_now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 7, 15, 0, 0).unwrap()
}

fn setup() -> axum::Router {
    let state = AppState::new(1024, Arc::new(ManualClock::new(fixed_now())));
    router(Arc::new(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn patch_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request("POST", uri, body))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn create_user(app: &axum::Router, email: &str, name: &str, role: &str) -> u64 {
    let (status, body) = post_json(
        app,
        "/users",
        json!({ "email": email, "full_name": name, "role": role }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_u64().unwrap()
}

async fn create_eve_shift_territory(app: &axum::Router) -> u64 {
    let (status, body) = post_json(
        app,
        "/territories",
        json!({
            "name": "Eve Shift",
            "zip_codes": ["90210"],
            "time_slot_days": ["mon", "tue", "wed", "thu", "fri"],
            "time_slot_start": "14:00",
            "time_slot_end": "22:00"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_u64().unwrap()
}

async fn assign_territory(app: &axum::Router, territory_id: u64, user_id: u64) -> Value {
    let (status, body) = post_json(
        app,
        &format!("/territories/{territory_id}/assign"),
        json!({ "user_id": user_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn health_returns_ok() {
    let app = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 0);
    assert_eq!(body["territories"], 0);
    assert_eq!(body["requests"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let app = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("open_requests"));
}

#[tokio::test]
async fn create_user_is_idempotent_by_email() {
    let app = setup();

    let first = create_user(&app, "pat@example.com", "Pat", "customer").await;
    let second = create_user(&app, "pat@example.com", "Pat Again", "customer").await;

    assert_eq!(first, second);

    let response = app.oneshot(get_request("/users")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_user_missing_fields_returns_400() {
    let app = setup();
    let (status, body) = post_json(
        &app,
        "/users",
        json!({ "email": "  ", "full_name": "Nobody", "role": "customer" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("email"));
}

#[tokio::test]
async fn create_territory_defaults_to_always_on_duty() {
    let app = setup();
    let (status, body) = post_json(
        &app,
        "/territories",
        json!({ "name": "Downtown", "zip_codes": ["10001"] }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "available");
    assert!(body["owner_id"].is_null());
    assert_eq!(body["schedule"]["days"].as_array().unwrap().len(), 7);
    assert_eq!(body["schedule"]["start"], "00:00:00");
    assert_eq!(body["schedule"]["end"], "23:59:59");
}

#[tokio::test]
async fn create_territory_without_zips_returns_400() {
    let app = setup();
    let (status, _) = post_json(
        &app,
        "/territories",
        json!({ "name": "Nowhere", "zip_codes": ["  "] }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn assign_territory_sets_sold_and_owner() {
    let app = setup();
    let owner = create_user(&app, "runner@example.com", "Runner Seven", "territory_owner").await;
    let territory = create_eve_shift_territory(&app).await;

    let body = assign_territory(&app, territory, owner).await;
    assert_eq!(body["status"], "sold");
    assert_eq!(body["owner_id"].as_u64().unwrap(), owner);
    assert!(!body["assigned_at"].is_null());

    let response = app.oneshot(get_request("/activity")).await.unwrap();
    let log = body_json(response).await;
    let entry = &log.as_array().unwrap()[0];
    assert_eq!(entry["action"], "territory_assigned");
    assert_eq!(entry["entity_type"], "territory");
    assert_eq!(entry["entity_id"].as_u64().unwrap(), territory);
}

#[tokio::test]
async fn territory_listing_joins_owner_and_orders_by_status() {
    let app = setup();
    let owner = create_user(&app, "zoe@example.com", "Zoe Owner", "territory_owner").await;

    let (_, sold) = post_json(
        &app,
        "/territories",
        json!({ "name": "Alpha", "zip_codes": ["11111"] }),
    )
    .await;
    post_json(
        &app,
        "/territories",
        json!({ "name": "Beta", "zip_codes": ["22222"] }),
    )
    .await;
    assign_territory(&app, sold["id"].as_u64().unwrap(), owner).await;

    let response = app.oneshot(get_request("/territories")).await.unwrap();
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();

    // Available territories list before sold ones despite name order.
    assert_eq!(rows[0]["name"], "Beta");
    assert_eq!(rows[0]["status"], "available");
    assert_eq!(rows[1]["name"], "Alpha");
    assert_eq!(rows[1]["status"], "sold");
    assert_eq!(rows[1]["owner_name"], "Zoe Owner");
    assert_eq!(rows[1]["owner_email"], "zoe@example.com");
}

#[tokio::test]
async fn request_missing_required_fields_returns_400() {
    let app = setup();
    let (status, body) = post_json(
        &app,
        "/requests",
        json!({ "title": "Groceries", "pickup": "", "dropoff": "123 X St 90210" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pickup"));
}

#[tokio::test]
async fn request_routes_to_on_duty_territory() {
    let app = setup();
    let owner = create_user(&app, "runner@example.com", "Runner Seven", "territory_owner").await;
    let territory = create_eve_shift_territory(&app).await;
    assign_territory(&app, territory, owner).await;

    // Tuesday 16:00 falls inside the Mon-Fri 14:00-22:00 window.
    let (status, body) = post_json(
        &app,
        "/requests",
        json!({
            "title": "Pharmacy run",
            "pickup": "456 Origin Ave",
            "dropoff": "123 X St 90210",
            "pickup_time": "2026-01-06T16:00:00Z"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "open");
    assert_eq!(body["territory_id"].as_u64().unwrap(), territory);
    assert_eq!(body["assigned_to"].as_u64().unwrap(), owner);
    assert!(body["accepted_by"].is_null());

    let response = app.oneshot(get_request("/activity")).await.unwrap();
    let log = body_json(response).await;
    let routed = log
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["action"] == "request_routed")
        .expect("routing writes an audit entry");
    assert_eq!(routed["entity_type"], "request");
    assert_eq!(routed["details"]["zip"], "90210");
    assert_eq!(routed["details"]["territory_id"].as_u64().unwrap(), territory);
}

#[tokio::test]
async fn request_outside_window_falls_back_to_admin() {
    let app = setup();
    let admin = create_user(&app, "admin@example.com", "Site Admin", "admin").await;
    let owner = create_user(&app, "runner@example.com", "Runner Seven", "territory_owner").await;
    let territory = create_eve_shift_territory(&app).await;
    assign_territory(&app, territory, owner).await;

    // Tuesday 09:00 is before the window opens.
    let (status, body) = post_json(
        &app,
        "/requests",
        json!({
            "title": "Morning errand",
            "pickup": "456 Origin Ave",
            "dropoff": "123 X St 90210",
            "pickup_time": "2026-01-06T09:00:00Z"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["territory_id"].is_null());
    assert_eq!(body["assigned_to"].as_u64().unwrap(), admin);
}

#[tokio::test]
async fn request_without_admin_or_match_is_unassigned() {
    let app = setup();

    let (status, body) = post_json(
        &app,
        "/requests",
        json!({
            "title": "Orphan errand",
            "pickup": "456 Origin Ave",
            "dropoff": "nowhere in particular"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["territory_id"].is_null());
    assert!(body["assigned_to"].is_null());
}

#[tokio::test]
async fn get_nonexistent_request_returns_404() {
    let app = setup();
    let response = app.oneshot(get_request("/requests/9999")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accept_claims_open_request_exactly_once() {
    let app = setup();
    let runner = create_user(&app, "runner@example.com", "Runner", "territory_owner").await;
    let rival = create_user(&app, "rival@example.com", "Rival", "territory_owner").await;

    let (_, request) = post_json(
        &app,
        "/requests",
        json!({ "title": "Groceries", "pickup": "A", "dropoff": "B 90210" }),
    )
    .await;
    let id = request["id"].as_u64().unwrap();

    let (status, body) = post_json(
        &app,
        &format!("/requests/{id}/accept"),
        json!({ "runner_id": runner }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["accepted_by"].as_u64().unwrap(), runner);

    let (status, body) = post_json(
        &app,
        &format!("/requests/{id}/accept"),
        json!({ "runner_id": rival }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no longer available"));

    // The winner's claim is untouched.
    let response = app
        .oneshot(get_request(&format!("/requests/{id}")))
        .await
        .unwrap();
    let row = body_json(response).await;
    assert_eq!(row["accepted_by"].as_u64().unwrap(), runner);
}

#[tokio::test]
async fn complete_requires_delivery_photo() {
    let app = setup();
    let runner = create_user(&app, "runner@example.com", "Runner", "territory_owner").await;

    let (_, request) = post_json(
        &app,
        "/requests",
        json!({ "title": "Groceries", "pickup": "A", "dropoff": "B 90210" }),
    )
    .await;
    let id = request["id"].as_u64().unwrap();

    post_json(&app, &format!("/requests/{id}/accept"), json!({ "runner_id": runner })).await;

    let (status, body) = post_json(&app, &format!("/requests/{id}/complete"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("delivery photo"));

    let (status, _) = post_json(
        &app,
        &format!("/requests/{id}/photo"),
        json!({ "photo_type": "delivery", "url": "https://photos.example/door.jpg" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(&app, &format!("/requests/{id}/complete"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(!body["completed_at"].is_null());
}

#[tokio::test]
async fn confirm_tip_and_rate_after_completion() {
    let app = setup();
    let customer = create_user(&app, "customer@example.com", "Customer", "customer").await;
    let runner = create_user(&app, "runner@example.com", "Runner", "territory_owner").await;

    let (_, request) = post_json(
        &app,
        "/requests",
        json!({
            "title": "Groceries",
            "pickup": "A",
            "dropoff": "B 90210",
            "created_by": customer
        }),
    )
    .await;
    let id = request["id"].as_u64().unwrap();

    // Guarded before completion.
    let (status, _) = post_json(&app, &format!("/requests/{id}/confirm-delivery"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_json(
        &app,
        &format!("/requests/{id}/tip"),
        json!({ "tip_amount": 5.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    post_json(&app, &format!("/requests/{id}/accept"), json!({ "runner_id": runner })).await;
    post_json(
        &app,
        &format!("/requests/{id}/photo"),
        json!({ "photo_type": "delivery", "url": "https://photos.example/door.jpg" }),
    )
    .await;
    post_json(&app, &format!("/requests/{id}/complete"), json!({})).await;

    let (status, first) = post_json(&app, &format!("/requests/{id}/confirm-delivery"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = post_json(&app, &format!("/requests/{id}/confirm-delivery"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["delivery_confirmed_at"], second["delivery_confirmed_at"]);

    let (status, body) = post_json(
        &app,
        &format!("/requests/{id}/tip"),
        json!({ "tip_amount": 5.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tip_amount"], 5.0);

    let (status, _) = post_json(
        &app,
        &format!("/requests/{id}/tip"),
        json!({ "tip_amount": 2.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/ratings",
        json!({
            "request_id": id,
            "from_user_id": customer,
            "to_user_id": runner,
            "rating": 6
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &app,
        "/ratings",
        json!({
            "request_id": id,
            "from_user_id": customer,
            "to_user_id": runner,
            "rating": 5,
            "review_text": "quick and careful"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 5);
    assert_eq!(body["request_id"].as_u64().unwrap(), id);
}

#[tokio::test]
async fn owner_listing_includes_assigned_and_territory_requests() {
    let app = setup();
    let admin = create_user(&app, "admin@example.com", "Admin", "admin").await;
    let owner = create_user(&app, "owner@example.com", "Owner", "territory_owner").await;
    let territory = create_eve_shift_territory(&app).await;
    assign_territory(&app, territory, owner).await;

    // Routed into the owner's territory (Tuesday 16:00, in window).
    post_json(
        &app,
        "/requests",
        json!({
            "title": "In-window errand",
            "pickup": "A",
            "dropoff": "B 90210",
            "pickup_time": "2026-01-06T16:00:00Z"
        }),
    )
    .await;

    // Outside the window: routed to the admin, not this owner.
    post_json(
        &app,
        "/requests",
        json!({
            "title": "Morning errand",
            "pickup": "A",
            "dropoff": "B 90210",
            "pickup_time": "2026-01-06T09:00:00Z"
        }),
    )
    .await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/requests/by-owner/{owner}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"], "In-window errand");

    let response = app
        .oneshot(get_request(&format!("/requests/by-owner/{admin}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn schedule_and_route_order_updates() {
    let app = setup();

    let (_, request) = post_json(
        &app,
        "/requests",
        json!({ "title": "Groceries", "pickup": "A", "dropoff": "B 90210" }),
    )
    .await;
    let id = request["id"].as_u64().unwrap();

    let (status, body) = post_json(
        &app,
        &format!("/requests/{id}/schedule"),
        json!({ "scheduled_time": "2026-01-08T10:30:00Z" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["scheduled_time"].is_null());

    let (status, body) = post_json(
        &app,
        &format!("/requests/{id}/route-order"),
        json!({ "route_order": 2 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["route_order"], 2);
}

#[tokio::test]
async fn user_status_change_is_audited() {
    let app = setup();
    let user = create_user(&app, "pat@example.com", "Pat", "customer").await;

    let response = app
        .clone()
        .oneshot(patch_request(
            &format!("/users/{user}/status"),
            json!({ "status": "suspended" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "suspended");

    let response = app.oneshot(get_request("/activity")).await.unwrap();
    let log = body_json(response).await;
    let entry = &log.as_array().unwrap()[0];
    assert_eq!(entry["action"], "status_changed");
    assert_eq!(entry["details"]["new_status"], "suspended");
}

#[tokio::test]
async fn concurrent_accepts_resolve_to_one_winner() {
    let state = Arc::new(AppState::new(1024, Arc::new(ManualClock::new(fixed_now()))));
    let app = router(state.clone());

    let (_, request) = post_json(
        &app,
        "/requests",
        json!({ "title": "Contested", "pickup": "A", "dropoff": "B 90210" }),
    )
    .await;
    let id = request["id"].as_u64().unwrap();

    let mut handles = Vec::new();
    for runner_id in 1..=8u64 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let response = app
                .oneshot(json_request(
                    "POST",
                    &format!("/requests/{id}/accept"),
                    json!({ "runner_id": runner_id }),
                ))
                .await
                .unwrap();
            response.status()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() == StatusCode::OK {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let row = state.requests.get(&id).unwrap();
    assert_eq!(row.status, errand_dispatch::models::request::RequestStatus::Accepted);
    assert!(row.accepted_by.is_some());
}
