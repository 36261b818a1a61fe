use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use ulid::Ulid;

use super::router;
use crate::engine::Engine;
use crate::notify::InvalidationHub;

fn test_app(name: &str) -> Router {
    let dir = std::env::temp_dir().join("innkeep_test_api");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{name}_{}.wal", Ulid::new()));
    let engine = Engine::new(path, Arc::new(InvalidationHub::new())).unwrap();
    router(Arc::new(engine))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn create_room(app: &Router, number: &str, capacity: u32) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/rooms",
        Some(json!({
            "number": number,
            "roomType": "DOUBLE",
            "price": "120.00",
            "capacity": capacity,
            "amenities": ["wifi", "minibar"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn create_booking(app: &Router, room_id: &str, check_in: &str, check_out: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/v1/bookings",
        Some(json!({
            "roomId": room_id,
            "guestId": Ulid::new().to_string(),
            "checkIn": check_in,
            "checkOut": check_out,
            "guests": 2,
            "totalPrice": "500.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_counts() {
    let app = test_app("health");
    create_room(&app, "101", 2).await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["rooms"], 1);
}

#[tokio::test]
async fn room_crud_round_trip() {
    let app = test_app("room_crud");
    let id = create_room(&app, "101", 2).await;

    let (status, body) = send(&app, Method::GET, &format!("/v1/rooms/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["number"], "101");
    assert_eq!(body["price"], "120.00");
    assert_eq!(body["status"], "AVAILABLE");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/v1/rooms/{id}"),
        Some(json!({
            "number": "102",
            "roomType": "SUITE",
            "price": 300,
            "capacity": 4,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["number"], "102");
    assert_eq!(body["capacity"], 4);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/rooms/{id}/status"),
        Some(json!({ "status": "MAINTENANCE" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "MAINTENANCE");

    let (status, _) = send(&app, Method::DELETE, &format!("/v1/rooms/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(&app, Method::GET, &format!("/v1/rooms/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn duplicate_room_number_conflicts() {
    let app = test_app("dup_number");
    create_room(&app, "101", 2).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/rooms",
        Some(json!({ "number": "101", "roomType": "SINGLE", "price": 80, "capacity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_ROOM_NUMBER");
}

#[tokio::test]
async fn search_honours_adjacency() {
    let app = test_app("search");
    let room = create_room(&app, "101", 2).await;
    create_booking(&app, &room, "2024-06-01", "2024-06-05").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/v1/rooms/available?check_in=2024-06-05&check_out=2024-06-08",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(
        &app,
        Method::GET,
        "/v1/rooms/available?check_in=2024-06-04&check_out=2024-06-06",
        None,
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/v1/rooms/{room}/availability?checkIn=2024-06-04&checkOut=2024-06-06"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], false);
}

#[tokio::test]
async fn search_rejects_inverted_range() {
    let app = test_app("search_range");
    let (status, body) = send(
        &app,
        Method::GET,
        "/v1/rooms/available?check_in=2024-06-05&check_out=2024-06-05",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_RANGE");

    let (status, body) = send(&app, Method::GET, "/v1/rooms/available?check_in=junk", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn overlapping_booking_conflicts() {
    let app = test_app("overlap");
    let room = create_room(&app, "101", 2).await;
    create_booking(&app, &room, "2024-06-01", "2024-06-05").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/bookings",
        Some(json!({
            "roomId": room,
            "guestId": Ulid::new().to_string(),
            "checkIn": "2024-06-04",
            "checkOut": "2024-06-06",
            "guests": 1,
            "totalPrice": 200,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ROOM_UNAVAILABLE");
}

#[tokio::test]
async fn lifecycle_endpoints() {
    let app = test_app("lifecycle");
    let room = create_room(&app, "101", 2).await;
    let id = create_booking(&app, &room, "2024-06-01", "2024-06-05").await;

    let (status, body) = send(&app, Method::GET, &format!("/v1/bookings/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["nights"], 4);

    for (path, expected) in [
        ("confirm", "CONFIRMED"),
        ("check-in", "CHECKED_IN"),
    ] {
        let (status, body) =
            send(&app, Method::POST, &format!("/v1/bookings/{id}/{path}"), None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], expected);
    }

    let (status, body) = send(&app, Method::POST, &format!("/v1/bookings/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (status, body) =
        send(&app, Method::POST, &format!("/v1/bookings/{id}/check-out"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "CHECKED_OUT");
}

#[tokio::test]
async fn patch_requires_every_field() {
    let app = test_app("patch_missing");
    let room = create_room(&app, "101", 2).await;
    let id = create_booking(&app, &room, "2024-06-01", "2024-06-05").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{id}"),
        Some(json!({ "checkIn": "2024-06-02", "guests": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let message = body["message"].as_str().unwrap();
    for field in ["roomId", "checkOut", "status", "totalPrice"] {
        assert!(message.contains(field), "{message}");
    }
    assert!(!message.contains("checkIn"), "{message}");
}

#[tokio::test]
async fn patch_rejects_malformed_values() {
    let app = test_app("patch_malformed");
    let room = create_room(&app, "101", 2).await;
    let id = create_booking(&app, &room, "2024-06-01", "2024-06-05").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{id}"),
        Some(json!({
            "roomId": room,
            "checkIn": "June 2nd",
            "checkOut": "2024-06-05",
            "guests": 1,
            "status": "PENDING",
            "totalPrice": "400.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("checkIn"));

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{id}"),
        Some(json!({
            "roomId": room,
            "checkIn": "2024-06-02",
            "checkOut": "2024-06-05",
            "guests": 1,
            "status": "SLEEPING",
            "totalPrice": "400.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/v1/bookings/not-a-ulid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_unknown_booking_is_404() {
    let app = test_app("patch_unknown");
    let room = create_room(&app, "101", 2).await;
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{}", Ulid::new()),
        Some(json!({
            "roomId": room,
            "checkIn": "2024-06-02",
            "checkOut": "2024-06-05",
            "guests": 1,
            "status": "PENDING",
            "totalPrice": "400.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn patch_applies_full_update() {
    let app = test_app("patch_ok");
    let room = create_room(&app, "101", 2).await;
    let other = create_room(&app, "102", 4).await;
    let id = create_booking(&app, &room, "2024-06-01", "2024-06-05").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/v1/bookings/{id}"),
        Some(json!({
            "roomId": other,
            "checkIn": "2024-06-02",
            "checkOut": "2024-06-06",
            "guests": 3,
            "status": "CONFIRMED",
            "totalPrice": "640.00",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["roomId"], other.as_str());
    assert_eq!(body["status"], "CONFIRMED");
    assert_eq!(body["totalPrice"], "640.00");
    assert_eq!(body["guests"], 3);
}

#[tokio::test]
async fn payments_and_balance() {
    let app = test_app("payments");
    let room = create_room(&app, "101", 2).await;
    let id = create_booking(&app, &room, "2024-06-01", "2024-06-05").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{id}/payments"),
        Some(json!({ "amount": "300.00", "method": "CARD" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "PENDING");
    let payment = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/payments/{payment}/settle"),
        Some(json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{id}/payments"),
        Some(json!({ "amount": "250.00", "method": "CASH" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "OVER_PAYMENT");

    let (status, body) = send(&app, Method::GET, &format!("/v1/bookings/{id}/balance"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalPaid"], "300.00");
    assert_eq!(body["remaining"], "200.00");

    let (status, body) = send(&app, Method::GET, &format!("/v1/payments/{payment}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["amount"], "300.00");

    let (_, body) = send(&app, Method::GET, &format!("/v1/bookings/{id}/payments"), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn guest_and_admin_lists() {
    let app = test_app("lists");
    let room = create_room(&app, "101", 2).await;
    let guest = Ulid::new().to_string();
    for (a, b) in [("2024-06-01", "2024-06-03"), ("2024-06-10", "2024-06-12")] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/bookings",
            Some(json!({
                "roomId": room,
                "guestId": guest,
                "checkIn": a,
                "checkOut": b,
                "guests": 1,
                "totalPrice": 100,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    create_booking(&app, &room, "2024-07-01", "2024-07-02").await;

    let (_, body) = send(&app, Method::GET, &format!("/v1/guests/{guest}/bookings"), None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    let (_, body) = send(&app, Method::GET, "/v1/bookings", None).await;
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn malformed_json_is_400() {
    let app = test_app("bad_json");
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/rooms")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
