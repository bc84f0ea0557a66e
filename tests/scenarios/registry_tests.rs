//! Registry invariants under churn.

use std::sync::Arc;

use test_case::test_case;

use chat_relay::application::services::HubError;
use chat_relay::domain::{ConnectionHandle, Envelope};
use chat_relay::infrastructure::pubsub::MemoryBus;

use crate::common::{connect, fake_identity, relay_node};

#[test_case(1, 1 ; "single room")]
#[test_case(4, 3 ; "several rooms")]
#[test_case(10, 7 ; "many rooms")]
#[tokio::test]
async fn test_index_matches_connections_after_churn(rooms: usize, per_room: usize) {
    let (node, _) = relay_node(Arc::new(MemoryBus::default())).await;
    let hub = node.hub();

    let mut live = Vec::new();
    for room in 0..rooms {
        for _ in 0..per_room {
            let (registration, queue) = connect(&node, fake_identity(), &format!("room-{}", room), 4).await;
            live.push((registration, queue));
            assert!(hub.snapshot().await.unwrap().is_consistent());
        }
    }
    assert_eq!(hub.connection_count().await.unwrap(), rooms * per_room);

    // Release every other connection
    let mut kept = Vec::new();
    for (i, (registration, queue)) in live.into_iter().enumerate() {
        if i % 2 == 0 {
            registration.release().await.unwrap();
            assert!(hub.snapshot().await.unwrap().is_consistent());
        } else {
            kept.push((registration, queue));
        }
    }

    let snapshot = hub.snapshot().await.unwrap();
    assert!(snapshot.is_consistent());
    assert_eq!(snapshot.connections.len(), kept.len());
}

/// Broadcast reaches exactly the room's members.
#[tokio::test]
async fn test_broadcast_reaches_exactly_room_members() {
    let (node, _) = relay_node(Arc::new(MemoryBus::default())).await;
    let hub = node.hub();

    let mut in_room = Vec::new();
    for _ in 0..3 {
        in_room.push(connect(&node, fake_identity(), "R1", 4).await);
    }
    let (_outside_reg, mut outside) = connect(&node, fake_identity(), "R2", 4).await;

    let delivered = hub
        .broadcast("R1", Arc::new(Envelope::system("R1", "hi")))
        .await
        .unwrap();
    assert_eq!(delivered, 3);
    assert_eq!(hub.snapshot().await.unwrap().members("R1").len(), 3);

    for (_, queue) in in_room.iter_mut() {
        assert_eq!(queue.frames.recv().await.unwrap().envelope.content, "hi");
    }
    assert!(outside.frames.try_recv().is_err());
}

#[tokio::test]
async fn test_register_after_shutdown_fails() {
    let (node, _) = relay_node(Arc::new(MemoryBus::default())).await;
    node.hub().shutdown().await;

    let (handle, _queue) = ConnectionHandle::new(fake_identity(), "R1", 4);
    assert!(matches!(
        node.hub().register(handle).await,
        Err(HubError::RegistryClosed)
    ));
}
