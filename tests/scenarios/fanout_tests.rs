//! Cross-process fan-out over one bus.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::timeout;

use chat_relay::domain::{
    room_channel, ConnectionQueue, Envelope, EventKind, Identity, MessageBus, OutboundFrame,
};
use chat_relay::infrastructure::pubsub::MemoryBus;

use crate::common::{connect, fake_identity, relay_node};

async fn next_frame(queue: &mut ConnectionQueue) -> OutboundFrame {
    timeout(Duration::from_secs(1), queue.frames.recv())
        .await
        .expect("frame not delivered in time")
        .expect("queue closed")
}

async fn assert_quiet(queue: &mut ConnectionQueue) {
    let extra = timeout(Duration::from_millis(200), queue.frames.recv()).await;
    assert!(extra.is_err(), "unexpected extra frame: {:?}", extra);
}

/// Two processes sharing a bus deliver each message exactly once to every
/// local connection of the room on both.
#[tokio::test]
async fn test_two_processes_deliver_exactly_once() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::default());
    let (node_a, _) = relay_node(bus.clone()).await;
    let (node_b, _) = relay_node(bus.clone()).await;

    let (_ra, mut on_a) = connect(&node_a, fake_identity(), "R1", 16).await;
    let (_rb, mut on_b) = connect(&node_b, fake_identity(), "R1", 16).await;

    let sender = Identity::new("u-1", "alice");
    let delivery = node_a
        .send_chat(&sender, "R1", "hello".into(), BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(delivery.delivered, 1);
    assert!(delivery.published);

    let local = next_frame(&mut on_a).await;
    let remote = next_frame(&mut on_b).await;
    assert_eq!(local.envelope.message_id, delivery.message_id);
    assert_eq!(remote.envelope.message_id, delivery.message_id);
    assert_eq!(remote.envelope.content, "hello");

    assert_quiet(&mut on_a).await;
    assert_quiet(&mut on_b).await;
}

/// R1 traffic never reaches an R2 connection on either process.
#[tokio::test]
async fn test_rooms_are_isolated_across_processes() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::default());
    let (node_a, _) = relay_node(bus.clone()).await;
    let (node_b, _) = relay_node(bus.clone()).await;

    let (_r1, mut in_r1) = connect(&node_b, fake_identity(), "R1", 16).await;
    let (_r2, mut in_r2) = connect(&node_b, fake_identity(), "R2", 16).await;

    node_a
        .send_chat(&fake_identity(), "R1", "only R1".into(), BTreeMap::new())
        .await
        .unwrap();

    assert_eq!(next_frame(&mut in_r1).await.envelope.content, "only R1");
    assert_quiet(&mut in_r2).await;
}

/// Replaying an envelope on the bus within the dedup window is a no-op.
#[tokio::test]
async fn test_replayed_message_id_is_dropped() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::default());
    let (node, _) = relay_node(bus.clone()).await;
    let (_registration, mut queue) = connect(&node, fake_identity(), "R1", 16).await;

    let envelope = Envelope::ingress(
        EventKind::Chat,
        "R1",
        &fake_identity(),
        "from a peer",
        BTreeMap::new(),
    );
    let payload = envelope.encode().unwrap();
    bus.publish(&room_channel("R1"), payload.clone()).await.unwrap();
    bus.publish(&room_channel("R1"), payload).await.unwrap();

    let frame = next_frame(&mut queue).await;
    assert_eq!(frame.envelope.message_id, envelope.message_id);
    assert_quiet(&mut queue).await;
}

/// Typing indicators cross processes but are never stored.
#[tokio::test]
async fn test_typing_crosses_processes_without_persistence() {
    let bus: Arc<dyn MessageBus> = Arc::new(MemoryBus::default());
    let (node_a, store_a) = relay_node(bus.clone()).await;
    let (node_b, store_b) = relay_node(bus.clone()).await;
    let (_rb, mut on_b) = connect(&node_b, fake_identity(), "R1", 16).await;

    node_a
        .typing(&fake_identity(), "R1", "start".into())
        .await
        .unwrap();

    let frame = next_frame(&mut on_b).await;
    assert_eq!(frame.envelope.kind, EventKind::Typing);
    assert!(store_a.messages("R1").is_empty());
    assert!(store_b.messages("R1").is_empty());
}
