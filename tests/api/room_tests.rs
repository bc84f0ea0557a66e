//! Room API Tests

use axum::http::StatusCode;

use chat_relay::domain::Identity;

use crate::common::{connect, fake_identity, issue_token, json_body, TestApp};

#[tokio::test]
async fn test_room_users_lists_local_connections() {
    let app = TestApp::new().await;
    let alice = Identity::new("u-1", "alice");
    let bob = Identity::new("u-2", "bob");

    let (_a1, _q1) = connect(&app.relay, alice.clone(), "R1", 8).await;
    // A second socket of the same user is listed once
    let (_a2, _q2) = connect(&app.relay, alice, "R1", 8).await;
    let (_b, _q3) = connect(&app.relay, bob, "R1", 8).await;
    let (_c, _q4) = connect(&app.relay, fake_identity(), "R2", 8).await;

    let response = app
        .get_auth("/api/rooms/R1/users", &issue_token(&fake_identity()))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["room_id"], "R1");
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "alice");
    assert_eq!(users[1]["username"], "bob");
}

#[tokio::test]
async fn test_room_users_empty_room() {
    let app = TestApp::new().await;

    let response = app
        .get_auth("/api/rooms/empty/users", &issue_token(&fake_identity()))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["users"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_room_users_requires_token() {
    let app = TestApp::new().await;

    let response = app.get("/api/rooms/R1/users").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unregistered_connection_leaves_listing() {
    let app = TestApp::new().await;
    let (registration, _queue) = connect(&app.relay, Identity::new("u-1", "alice"), "R1", 8).await;
    registration.release().await.unwrap();

    let response = app
        .get_auth("/api/rooms/R1/users", &issue_token(&fake_identity()))
        .await;

    assert_eq!(json_body(response).await["users"].as_array().unwrap().len(), 0);
}
