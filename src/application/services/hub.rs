//! Connection Registry ("Hub")
//!
//! The single authority over the live connection set. One control loop owns
//! the connection map and the room index; every other component talks to it
//! through the cloneable `Hub` handle, which only sends requests over
//! channels and awaits replies.
//!
//! ```text
//!  register ─────┐
//!  unregister ───┼──► control loop ──► RegistryState { connections, room_index }
//!  broadcast ────┤                         │
//!  query ────────┘                         └──► try_send on each member queue
//! ```
//!
//! Broadcast never waits on a consumer: a member whose queue is full is
//! evicted (its queue closed, its entry removed) instead of stalling the room.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::room_index::{RegistrySnapshot, RegistryState};
use crate::domain::{ConnectionHandle, ConnectionId, Envelope, Identity, OutboundFrame, ProtocolError};
use crate::infrastructure::metrics;

/// Default bound of the register/broadcast/query request channels.
pub const DEFAULT_COMMAND_BUFFER: usize = 1024;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("Connection registry is closed")]
    RegistryClosed,

    #[error("Connection not found: {0}")]
    NotFound(ConnectionId),

    #[error("Duplicate connection id: {0}")]
    DuplicateConnection(ConnectionId),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub command_buffer: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

struct RegisterRequest {
    handle: ConnectionHandle,
    reply: oneshot::Sender<Result<(), HubError>>,
}

struct UnregisterRequest {
    id: ConnectionId,
    reply: Option<oneshot::Sender<bool>>,
}

struct BroadcastRequest {
    room_id: String,
    frame: OutboundFrame,
    reply: oneshot::Sender<usize>,
}

enum QueryRequest {
    RoomUsers {
        room_id: String,
        reply: oneshot::Sender<Vec<Identity>>,
    },
    ConnectionCount {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<RegistrySnapshot>,
    },
}

struct Lifecycle {
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running connection registry.
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<RegisterRequest>,
    unregister_tx: mpsc::UnboundedSender<UnregisterRequest>,
    broadcast_tx: mpsc::Sender<BroadcastRequest>,
    query_tx: mpsc::Sender<QueryRequest>,
    lifecycle: Arc<Lifecycle>,
}

impl Hub {
    /// Spawn the control loop and return a handle to it.
    pub fn start(config: HubConfig) -> Self {
        let buffer = config.command_buffer.max(1);
        let (register_tx, register_rx) = mpsc::channel(buffer);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = mpsc::channel(buffer);
        let (query_tx, query_rx) = mpsc::channel(buffer);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let control = ControlLoop {
            state: RegistryState::new(),
            register_rx,
            unregister_rx,
            broadcast_rx,
            query_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(control.run());

        info!(command_buffer = buffer, "Connection registry started");

        Self {
            register_tx,
            unregister_tx,
            broadcast_tx,
            query_tx,
            lifecycle: Arc::new(Lifecycle {
                shutdown,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Register a connection. The returned guard unregisters it when dropped.
    pub async fn register(&self, handle: ConnectionHandle) -> Result<Registration, HubError> {
        if self.is_closed() {
            return Err(HubError::RegistryClosed);
        }

        let id = handle.id.clone();
        let (reply, rx) = oneshot::channel();
        self.register_tx
            .send(RegisterRequest { handle, reply })
            .await
            .map_err(|_| HubError::RegistryClosed)?;
        rx.await.map_err(|_| HubError::RegistryClosed)??;

        Ok(Registration {
            id,
            unregister_tx: self.unregister_tx.clone(),
            released: false,
        })
    }

    /// Remove a connection and close its queue.
    pub async fn unregister(&self, id: &ConnectionId) -> Result<(), HubError> {
        let (reply, rx) = oneshot::channel();
        self.unregister_tx
            .send(UnregisterRequest {
                id: id.clone(),
                reply: Some(reply),
            })
            .map_err(|_| HubError::RegistryClosed)?;

        match rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(HubError::NotFound(id.clone())),
            Err(_) => Err(HubError::RegistryClosed),
        }
    }

    /// Deliver `envelope` to every connection in `room_id` on this process.
    /// Returns how many queues accepted it.
    pub async fn broadcast(&self, room_id: &str, envelope: Arc<Envelope>) -> Result<usize, HubError> {
        let frame = OutboundFrame::encode(envelope)?;
        let (reply, rx) = oneshot::channel();
        self.broadcast_tx
            .send(BroadcastRequest {
                room_id: room_id.to_string(),
                frame,
                reply,
            })
            .await
            .map_err(|_| HubError::RegistryClosed)?;
        rx.await.map_err(|_| HubError::RegistryClosed)
    }

    /// Distinct users with a live socket in `room_id` on this process.
    pub async fn room_users(&self, room_id: &str) -> Result<Vec<Identity>, HubError> {
        self.query(|reply| QueryRequest::RoomUsers {
            room_id: room_id.to_string(),
            reply,
        })
        .await
    }

    pub async fn connection_count(&self) -> Result<usize, HubError> {
        self.query(|reply| QueryRequest::ConnectionCount { reply }).await
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot, HubError> {
        self.query(|reply| QueryRequest::Snapshot { reply }).await
    }

    pub fn is_closed(&self) -> bool {
        *self.lifecycle.shutdown.borrow()
    }

    /// Stop the control loop, closing every connection queue, and wait for it.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown.send_replace(true);

        let task = self.lifecycle.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Connection registry task failed");
            }
        }
    }

    async fn query<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> QueryRequest,
    ) -> Result<T, HubError> {
        let (reply, rx) = oneshot::channel();
        self.query_tx
            .send(build(reply))
            .await
            .map_err(|_| HubError::RegistryClosed)?;
        rx.await.map_err(|_| HubError::RegistryClosed)
    }
}

/// Scoped registration. Unregisters exactly once: either through
/// [`Registration::release`] or on drop, whichever comes first.
#[must_use = "dropping the registration unregisters the connection"]
pub struct Registration {
    id: ConnectionId,
    unregister_tx: mpsc::UnboundedSender<UnregisterRequest>,
    released: bool,
}

impl Registration {
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Unregister now and report whether the registry still knew the id
    /// (it will not if the connection was evicted as a slow consumer).
    pub async fn release(mut self) -> Result<(), HubError> {
        self.released = true;
        let (reply, rx) = oneshot::channel();
        self.unregister_tx
            .send(UnregisterRequest {
                id: self.id.clone(),
                reply: Some(reply),
            })
            .map_err(|_| HubError::RegistryClosed)?;

        match rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(HubError::NotFound(self.id.clone())),
            Err(_) => Err(HubError::RegistryClosed),
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            let _ = self.unregister_tx.send(UnregisterRequest {
                id: self.id.clone(),
                reply: None,
            });
        }
    }
}

struct ControlLoop {
    state: RegistryState,
    register_rx: mpsc::Receiver<RegisterRequest>,
    unregister_rx: mpsc::UnboundedReceiver<UnregisterRequest>,
    broadcast_rx: mpsc::Receiver<BroadcastRequest>,
    query_rx: mpsc::Receiver<QueryRequest>,
    shutdown: watch::Receiver<bool>,
}

impl ControlLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                Some(request) = self.unregister_rx.recv() => self.handle_unregister(request),
                Some(request) = self.register_rx.recv() => self.handle_register(request),
                Some(request) = self.broadcast_rx.recv() => self.handle_broadcast(request),
                Some(request) = self.query_rx.recv() => self.handle_query(request),
                else => break,
            }
        }

        let closed = self.state.drain();
        metrics::set_websocket_connections(0);
        info!(closed, "Connection registry stopped");
    }

    fn handle_register(&mut self, request: RegisterRequest) {
        let RegisterRequest { handle, reply } = request;
        let id = handle.id.clone();
        let room_id = handle.room_id.clone();
        let user_id = handle.identity.user_id.clone();

        let result = match self.state.insert(handle) {
            Ok(()) => {
                info!(
                    connection_id = %id,
                    room_id = %room_id,
                    user_id = %user_id,
                    "Connection registered"
                );
                Ok(())
            }
            Err(rejected) => {
                error!(connection_id = %id, "Duplicate connection id on register");
                rejected.close();
                Err(HubError::DuplicateConnection(id))
            }
        };

        metrics::set_websocket_connections(self.state.connection_count());
        let _ = reply.send(result);
    }

    fn handle_unregister(&mut self, request: UnregisterRequest) {
        let found = match self.state.remove(&request.id) {
            Some(handle) => {
                info!(
                    connection_id = %request.id,
                    room_id = %handle.room_id,
                    "Connection unregistered"
                );
                handle.close();
                true
            }
            None => {
                debug!(connection_id = %request.id, "Unregister for unknown connection");
                false
            }
        };

        metrics::set_websocket_connections(self.state.connection_count());
        if let Some(reply) = request.reply {
            let _ = reply.send(found);
        }
    }

    fn handle_broadcast(&mut self, request: BroadcastRequest) {
        let kind = request.frame.envelope.kind;
        let outcome = self.state.fan_out(&request.room_id, &request.frame);

        if !outcome.evicted.is_empty() {
            for id in &outcome.evicted {
                warn!(
                    connection_id = %id,
                    room_id = %request.room_id,
                    "Outbound queue full, dropping slow consumer"
                );
            }
            metrics::record_evictions(outcome.evicted.len());
            metrics::set_websocket_connections(self.state.connection_count());
        }

        metrics::record_broadcast(kind.as_str(), outcome.delivered);
        debug!(
            room_id = %request.room_id,
            message_id = %request.frame.envelope.message_id,
            delivered = outcome.delivered,
            "Broadcast"
        );
        let _ = request.reply.send(outcome.delivered);
    }

    fn handle_query(&mut self, request: QueryRequest) {
        match request {
            QueryRequest::RoomUsers { room_id, reply } => {
                let _ = reply.send(self.state.room_users(&room_id));
            }
            QueryRequest::ConnectionCount { reply } => {
                let _ = reply.send(self.state.connection_count());
            }
            QueryRequest::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
        }
    }
}
