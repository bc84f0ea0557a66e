//! RPC Gateway Tests

use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;

use chat_relay::presentation::rpc::STREAM_GREETING;

use crate::common::{connect, fake_identity, issue_token, json_body, TestApp};

const SEND: &str = "/chat.v1.ChatService/SendMessage";

#[tokio::test]
async fn test_send_message_over_rpc() {
    let app = TestApp::new().await;
    let (_registration, mut queue) = connect(&app.relay, fake_identity(), "R1", 8).await;

    let response = app
        .rpc_post(
            SEND,
            &json!({"room_id": "R1", "content": "via rpc"}).to_string(),
            Some(&issue_token(&fake_identity())),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(!body["message_id"].as_str().unwrap().is_empty());
    assert_eq!(body["delivered"], 1);

    let frame = queue.frames.recv().await.unwrap();
    assert_eq!(frame.envelope.content, "via rpc");
    assert_eq!(app.store.messages("R1").len(), 1);
}

#[tokio::test]
async fn test_send_message_requires_token() {
    let app = TestApp::new().await;

    let response = app
        .rpc_post(SEND, &json!({"room_id": "R1", "content": "x"}).to_string(), None)
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_send_message_invalid_argument() {
    let app = TestApp::new().await;

    let response = app
        .rpc_post(
            SEND,
            &json!({"room_id": "", "content": "x"}).to_string(),
            Some(&issue_token(&fake_identity())),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 3);
}

#[tokio::test]
async fn test_stream_messages_yields_greeting_then_room_traffic() {
    let app = TestApp::new().await;
    let token = issue_token(&fake_identity());

    let response = app
        .rpc_get("/chat.v1.ChatService/StreamMessages?room_id=R1", &token)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();

    let first = timeout(Duration::from_secs(1), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    assert!(first.contains("event: system"));
    assert!(first.contains(STREAM_GREETING));

    app.rpc_post(
        SEND,
        &json!({"room_id": "R1", "content": "streamed"}).to_string(),
        Some(&token),
    )
    .await;

    let next = timeout(Duration::from_secs(1), body.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let next = String::from_utf8(next.to_vec()).unwrap();
    assert!(next.contains("event: chat"));
    assert!(next.contains("streamed"));
}

#[tokio::test]
async fn test_stream_releases_subscription_on_disconnect() {
    let app = TestApp::new().await;
    let baseline = app.bus.subscriber_count();

    let response = app
        .rpc_get(
            "/chat.v1.ChatService/StreamMessages?room_id=R1",
            &issue_token(&fake_identity()),
        )
        .await;
    assert_eq!(app.bus.subscriber_count(), baseline + 1);

    drop(response);
    assert_eq!(app.bus.subscriber_count(), baseline);
}

#[tokio::test]
async fn test_join_and_leave_room_over_rpc() {
    let app = TestApp::new().await;
    let (_registration, mut queue) = connect(&app.relay, fake_identity(), "R1", 8).await;
    let caller = fake_identity();
    let token = issue_token(&caller);
    let body = json!({"room_id": "R1"}).to_string();

    let response = app
        .rpc_post("/chat.v1.ChatService/JoinRoom", &body, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let joined = json_body(response).await;
    assert_eq!(joined["success"], true);
    assert_eq!(joined["delivered"], 1);
    assert!(app.store.is_member("R1", &caller.user_id));

    let frame = queue.frames.recv().await.unwrap();
    assert_eq!(
        frame.envelope.content,
        format!("{} joined the room", caller.username)
    );

    let response = app
        .rpc_post("/chat.v1.ChatService/LeaveRoom", &body, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!app.store.is_member("R1", &caller.user_id));

    let frame = queue.frames.recv().await.unwrap();
    assert_eq!(
        frame.envelope.content,
        format!("{} left the room", caller.username)
    );
}

#[tokio::test]
async fn test_join_room_requires_token() {
    let app = TestApp::new().await;

    let response = app
        .rpc_post(
            "/chat.v1.ChatService/JoinRoom",
            &json!({"room_id": "R1"}).to_string(),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_get_online_users_over_rpc() {
    let app = TestApp::new().await;
    let member = fake_identity();
    let (_registration, _queue) = connect(&app.relay, member.clone(), "R1", 8).await;

    let response = app
        .rpc_post(
            "/chat.v1.ChatService/GetOnlineUsers",
            &json!({"room_id": "R1"}).to_string(),
            Some(&issue_token(&fake_identity())),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["room_id"], "R1");
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
    assert_eq!(body["users"][0]["user_id"], member.user_id.as_str());
}

#[tokio::test]
async fn test_get_online_users_rejects_empty_room() {
    let app = TestApp::new().await;

    let response = app
        .rpc_post(
            "/chat.v1.ChatService/GetOnlineUsers",
            &json!({"room_id": ""}).to_string(),
            Some(&issue_token(&fake_identity())),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], 3);
}
