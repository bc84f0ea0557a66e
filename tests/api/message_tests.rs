//! Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use chat_relay::domain::EventKind;

use crate::common::{connect, fake_identity, issue_token, json_body, TestApp};

#[tokio::test]
async fn test_send_message_requires_token() {
    let app = TestApp::new().await;

    let response = app
        .post_json("/api/rooms/R1/messages", &json!({"content": "hi"}).to_string())
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_message_rejects_bad_token() {
    let app = TestApp::new().await;

    let response = app
        .post_json_auth(
            "/api/rooms/R1/messages",
            &json!({"content": "hi"}).to_string(),
            "not-a-token",
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_message_persists_and_delivers() {
    let app = TestApp::new().await;
    let sender = fake_identity();
    let (_registration, mut queue) = connect(&app.relay, fake_identity(), "R1", 8).await;

    let response = app
        .post_json_auth(
            "/api/rooms/R1/messages",
            &json!({"content": "hello room", "metadata": {"client": "test"}}).to_string(),
            &issue_token(&sender),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["persisted"], true);
    assert_eq!(body["delivered"], 1);
    let message_id = body["message_id"].as_str().unwrap().to_string();

    let stored = app.store.messages("R1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].message_id, message_id);
    assert_eq!(stored[0].sender_id, sender.user_id);

    let frame = queue.frames.recv().await.unwrap();
    assert_eq!(frame.envelope.kind, EventKind::Chat);
    assert_eq!(frame.envelope.content, "hello room");
    assert_eq!(frame.envelope.sender_name, sender.username);
    assert_eq!(frame.envelope.metadata.get("client").map(String::as_str), Some("test"));
}

#[tokio::test]
async fn test_send_message_validates_content() {
    let app = TestApp::new().await;
    let token = issue_token(&fake_identity());

    let empty = app
        .post_json_auth("/api/rooms/R1/messages", &json!({"content": ""}).to_string(), &token)
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let long = "x".repeat(2001);
    let too_long = app
        .post_json_auth("/api/rooms/R1/messages", &json!({"content": long}).to_string(), &token)
        .await;
    assert_eq!(too_long.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.messages("R1").is_empty());
}

#[tokio::test]
async fn test_send_message_rejects_pattern_room() {
    let app = TestApp::new().await;

    let response = app
        .post_json_auth(
            "/api/rooms/room*/messages",
            &json!({"content": "hi"}).to_string(),
            &issue_token(&fake_identity()),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
