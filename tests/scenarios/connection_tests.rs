//! Full connections driven through the pumps over in-memory sockets.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use chat_relay::application::services::ChatRelay;
use chat_relay::domain::{Envelope, EventKind, Identity, MessageBus, UserStatus};
use chat_relay::infrastructure::pubsub::MemoryBus;
use chat_relay::presentation::websocket::{serve_connection, ConnectionConfig, DisconnectReason};

use crate::common::relay_node;

struct Client {
    inbound: mpsc::Sender<Result<Message, axum::Error>>,
    outbound: mpsc::Receiver<Message>,
    task: JoinHandle<DisconnectReason>,
}

impl Client {
    fn open(relay: &ChatRelay, identity: Identity, room_id: &str) -> Self {
        let (inbound, stream) = mpsc::channel(16);
        let (sink, outbound) = mpsc::channel(16);
        let task = tokio::spawn(serve_connection(
            stream,
            sink,
            relay.clone(),
            identity,
            room_id.to_string(),
            ConnectionConfig::default(),
        ));
        Self {
            inbound,
            outbound,
            task,
        }
    }

    async fn send(&mut self, text: &str) {
        self.inbound
            .send(Ok(Message::Text(text.into())))
            .await
            .unwrap();
    }

    async fn recv(&mut self) -> Envelope {
        let message = timeout(Duration::from_secs(1), self.outbound.next())
            .await
            .expect("no frame in time")
            .expect("socket closed");
        match message {
            Message::Text(text) => Envelope::decode(text.as_str().as_bytes()).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    /// Skip frames until one of `kind` arrives.
    async fn recv_kind(&mut self, kind: EventKind) -> Envelope {
        loop {
            let envelope = self.recv().await;
            if envelope.kind == kind {
                return envelope;
            }
        }
    }
}

/// Scenario R1: two users in one room see each other's messages on two
/// different processes.
#[tokio::test]
async fn test_chat_between_processes() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::default());
    let (node_a, store_a) = relay_node(bus.clone()).await;
    let (node_b, _) = relay_node(bus.clone()).await;

    let mut alice = Client::open(&node_a, Identity::new("u-1", "alice"), "R1");
    let mut bob = Client::open(&node_b, Identity::new("u-2", "bob"), "R1");

    assert_eq!(alice.recv().await.content, "Welcome alice to room R1");
    assert_eq!(bob.recv().await.content, "Welcome bob to room R1");

    alice.send(r#"{"kind":"join"}"#).await;
    let joined = bob.recv_kind(EventKind::Join).await;
    assert_eq!(joined.content, "alice joined the room");
    assert!(store_a.is_member("R1", "u-1"));
    assert_eq!(store_a.status("u-1"), UserStatus::Online);

    alice.send(r#"{"kind":"chat","content":"hi bob"}"#).await;
    let chat = bob.recv_kind(EventKind::Chat).await;
    assert_eq!(chat.content, "hi bob");
    assert_eq!(chat.sender_id, "u-1");
    assert_eq!(chat.sender_name, "alice");

    // The sender sees its own message once, through its local registry
    let echo = alice.recv_kind(EventKind::Chat).await;
    assert_eq!(echo.message_id, chat.message_id);
}

/// Scenario R2: leaving ends the connection and the others are told.
#[tokio::test]
async fn test_leave_closes_connection() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::default());
    let (node, store) = relay_node(bus).await;

    let mut alice = Client::open(&node, Identity::new("u-1", "alice"), "R2");
    let mut bob = Client::open(&node, Identity::new("u-2", "bob"), "R2");
    alice.recv().await;
    bob.recv().await;

    alice.send(r#"{"kind":"join"}"#).await;
    bob.recv_kind(EventKind::Join).await;

    alice.send(r#"{"kind":"leave"}"#).await;
    let left = bob.recv_kind(EventKind::Leave).await;
    assert_eq!(left.content, "alice left the room");

    let reason = timeout(Duration::from_secs(2), alice.task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, DisconnectReason::Left);
    assert!(!store.is_member("R2", "u-1"));

    let users = node.hub().room_users("R2").await.unwrap();
    assert_eq!(users, vec![Identity::new("u-2", "bob")]);
}

/// Repeated protocol violations disconnect only the offender.
#[tokio::test]
async fn test_violation_limit_disconnects() {
    let (node, _) = relay_node(Arc::new(MemoryBus::default())).await;

    let mut mallory = Client::open(&node, Identity::new("u-9", "mallory"), "R1");
    let mut bob = Client::open(&node, Identity::new("u-2", "bob"), "R1");
    mallory.recv().await;
    bob.recv().await;

    for _ in 0..5 {
        mallory.send(r#"{"kind":"system","content":"spoof"}"#).await;
    }

    let reason = timeout(Duration::from_secs(2), mallory.task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reason, DisconnectReason::ViolationLimit);

    bob.send(r#"{"kind":"chat","content":"still here"}"#).await;
    assert_eq!(bob.recv_kind(EventKind::Chat).await.content, "still here");
}
