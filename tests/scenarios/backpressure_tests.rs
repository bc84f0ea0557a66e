//! Slow consumer eviction.

use std::sync::Arc;

use chat_relay::domain::{Envelope, DEFAULT_QUEUE_CAPACITY};
use chat_relay::infrastructure::pubsub::MemoryBus;

use crate::common::{connect, fake_identity, relay_node};

/// A connection that never drains its 256-slot queue is evicted on the
/// 257th message and receives nothing afterwards.
#[tokio::test]
async fn test_257th_message_evicts_stalled_connection() {
    let (node, _) = relay_node(Arc::new(MemoryBus::default())).await;
    let hub = node.hub();

    let (_stalled_reg, stalled) =
        connect(&node, fake_identity(), "R1", DEFAULT_QUEUE_CAPACITY).await;
    let (_healthy_reg, mut healthy) =
        connect(&node, fake_identity(), "R1", DEFAULT_QUEUE_CAPACITY + 8).await;

    for i in 0..DEFAULT_QUEUE_CAPACITY {
        let delivered = hub
            .broadcast("R1", Arc::new(Envelope::system("R1", format!("m{}", i))))
            .await
            .unwrap();
        assert_eq!(delivered, 2);
    }

    let delivered = hub
        .broadcast("R1", Arc::new(Envelope::system("R1", "m256")))
        .await
        .unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(hub.connection_count().await.unwrap(), 1);

    // Eviction closes the stalled connection's queue
    stalled.closed.notified().await;

    let delivered = hub
        .broadcast("R1", Arc::new(Envelope::system("R1", "after")))
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    // The healthy consumer saw everything, in order
    for i in 0..DEFAULT_QUEUE_CAPACITY {
        let frame = healthy.frames.recv().await.unwrap();
        assert_eq!(frame.envelope.content, format!("m{}", i));
    }
    assert_eq!(healthy.frames.recv().await.unwrap().envelope.content, "m256");
    assert_eq!(healthy.frames.recv().await.unwrap().envelope.content, "after");

    assert!(hub.snapshot().await.unwrap().is_consistent());
}

/// A broadcast with one stalled member still reaches the others.
#[tokio::test]
async fn test_stalled_member_does_not_block_room() {
    let (node, _) = relay_node(Arc::new(MemoryBus::default())).await;
    let hub = node.hub();

    let (_stalled_reg, _stalled) = connect(&node, fake_identity(), "R1", 1).await;
    let (_other_reg, mut other) = connect(&node, fake_identity(), "R1", 8).await;

    hub.broadcast("R1", Arc::new(Envelope::system("R1", "a")))
        .await
        .unwrap();
    hub.broadcast("R1", Arc::new(Envelope::system("R1", "b")))
        .await
        .unwrap();

    assert_eq!(other.frames.recv().await.unwrap().envelope.content, "a");
    assert_eq!(other.frames.recv().await.unwrap().envelope.content, "b");
    assert_eq!(hub.connection_count().await.unwrap(), 1);
}
