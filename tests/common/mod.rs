//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use fake::faker::internet::en::Username;
use fake::Fake;
use jsonwebtoken::{encode, EncodingKey, Header};
use tower::ServiceExt;

use chat_relay::application::services::{BridgeConfig, ChatRelay, FanoutBridge, Hub, HubConfig};
use chat_relay::config::{
    BridgeSettings, CorsSettings, DatabaseSettings, HubSettings, JwtSettings, RedisSettings,
    RpcSettings, ServerSettings, Settings, WebSocketSettings,
};
use chat_relay::domain::{ConnectionHandle, ConnectionQueue, Identity, MessageBus};
use chat_relay::infrastructure::pubsub::MemoryBus;
use chat_relay::infrastructure::repositories::MemoryChatStore;
use chat_relay::presentation::middleware::Claims;
use chat_relay::startup::Application;

pub const TEST_SECRET: &str = "test-secret-test-secret-test-secret";

/// Settings for an in-memory relay on ephemeral ports
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        rpc: RpcSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
        },
        redis: RedisSettings { url: String::new() },
        jwt: JwtSettings {
            secret: TEST_SECRET.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec!["http://localhost:3000".into()],
        },
        websocket: WebSocketSettings::default(),
        hub: HubSettings::default(),
        bridge: BridgeSettings::default(),
        environment: "test".into(),
    }
}

/// Sign a token the relay accepts
pub fn issue_token(identity: &Identity) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: identity.user_id.clone(),
        username: identity.username.clone(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// A random user
pub fn fake_identity() -> Identity {
    let username: String = Username().fake();
    Identity::new(uuid::Uuid::new_v4().to_string(), username)
}

/// One relay process: registry, bridge and store around a shared bus
pub async fn relay_node(bus: Arc<dyn MessageBus>) -> (ChatRelay, Arc<MemoryChatStore>) {
    let store = Arc::new(MemoryChatStore::new());
    let hub = Hub::start(HubConfig::default());
    let bridge = FanoutBridge::start(bus, hub.clone(), BridgeConfig::default()).await;
    (ChatRelay::new(hub, bridge, store.clone()), store)
}

/// Register a bare connection (no pumps) so tests can read its queue
pub async fn connect(
    relay: &ChatRelay,
    identity: Identity,
    room_id: &str,
    capacity: usize,
) -> (chat_relay::application::services::Registration, ConnectionQueue) {
    let (handle, queue) = ConnectionHandle::new(identity, room_id, capacity);
    let registration = relay.hub().register(handle).await.unwrap();
    (registration, queue)
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub rpc_router: Router,
    pub relay: ChatRelay,
    pub store: Arc<MemoryChatStore>,
    pub bus: Arc<MemoryBus>,
    /// Held so the shutdown sender outlives the test's streams.
    _app: Application,
}

impl TestApp {
    /// Create a test application on in-memory collaborators
    pub async fn new() -> Self {
        Self::with_bus(Arc::new(MemoryBus::default())).await
    }

    pub async fn with_bus(bus: Arc<MemoryBus>) -> Self {
        let store = Arc::new(MemoryChatStore::new());
        let app = Application::with_collaborators(test_settings(), store.clone(), bus.clone())
            .await
            .unwrap();

        Self {
            router: app.router(),
            rpc_router: app.rpc_router(),
            relay: app.relay().clone(),
            store,
            bus,
            _app: app,
        }
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        send(&self.router, get_request(uri, None)).await
    }

    /// Make an authenticated GET request
    pub async fn get_auth(&self, uri: &str, token: &str) -> axum::response::Response {
        send(&self.router, get_request(uri, Some(token))).await
    }

    /// Make an authenticated POST request with JSON body
    pub async fn post_json_auth(
        &self,
        uri: &str,
        body: &str,
        token: &str,
    ) -> axum::response::Response {
        send(&self.router, post_request(uri, body, Some(token))).await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, uri: &str, body: &str) -> axum::response::Response {
        send(&self.router, post_request(uri, body, None)).await
    }

    /// Make an authenticated POST request to the RPC gateway
    pub async fn rpc_post(&self, uri: &str, body: &str, token: Option<&str>) -> axum::response::Response {
        send(&self.rpc_router, post_request(uri, body, token)).await
    }

    /// Make an authenticated GET request to the RPC gateway
    pub async fn rpc_get(&self, uri: &str, token: &str) -> axum::response::Response {
        send(&self.rpc_router, get_request(uri, Some(token))).await
    }
}

async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_request(uri: &str, body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Read a whole response body as JSON
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
