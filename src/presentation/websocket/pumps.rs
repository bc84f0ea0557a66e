//! Read and write pumps.
//!
//! Each connection runs two tasks. The read pump decodes client frames and
//! dispatches them through the relay; the write pump drains the outbound
//! queue to the socket and pings the peer every period, so a quiet client
//! that answers with pongs keeps its read deadline fresh. Both are generic
//! over the socket halves so they can be driven by in-memory channels.

use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::session::ConnectionConfig;
use crate::application::services::{ChatRelay, HubError, RelayError};
use crate::domain::{ClientFrame, ConnectionQueue, Identity, ProtocolError};

/// Socket-level failures. They only ever end the one connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Write timed out")]
    WriteTimeout,

    #[error("Pump task failed: {0}")]
    Task(String),
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Close frame or end of stream from the peer
    PeerClosed,
    /// Nothing received within the read deadline
    IdleTimeout,
    ViolationLimit,
    /// The client sent `leave`
    Left,
    /// The registry closed the outbound queue (eviction, unregister or shutdown)
    QueueClosed,
    RegistryClosed,
    Transport(TransportError),
}

impl DisconnectReason {
    /// Idle timeouts and orderly closes are normal disconnects.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Everything the read pump needs besides the socket.
pub struct ReadContext {
    pub relay: ChatRelay,
    pub identity: Identity,
    pub room_id: String,
    pub config: ConnectionConfig,
}

/// Read frames until the peer goes away, goes quiet, leaves, or exceeds the
/// violation limit. Frames are handled strictly in arrival order.
pub async fn read_pump<St, E>(mut stream: St, ctx: ReadContext) -> DisconnectReason
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut violations = 0u32;

    loop {
        let message = match timeout(ctx.config.read_timeout, stream.next()).await {
            Err(_) => return DisconnectReason::IdleTimeout,
            Ok(None) => return DisconnectReason::PeerClosed,
            Ok(Some(Err(e))) => {
                return DisconnectReason::Transport(TransportError::Read(e.to_string()))
            }
            Ok(Some(Ok(message))) => message,
        };

        let violation = match message {
            Message::Text(text) => match ClientFrame::decode(text.as_str()) {
                Ok(frame) => {
                    match ctx
                        .relay
                        .dispatch(&ctx.identity, &ctx.room_id, frame)
                        .await
                    {
                        Ok(dispatched) if dispatched.ends_connection() => {
                            return DisconnectReason::Left
                        }
                        Ok(_) => None,
                        Err(RelayError::Hub(HubError::RegistryClosed)) => {
                            return DisconnectReason::RegistryClosed
                        }
                        Err(RelayError::Protocol(e)) => Some(e),
                        Err(e) => {
                            warn!(room_id = %ctx.room_id, error = %e, "Failed to relay frame");
                            None
                        }
                    }
                }
                Err(e) => Some(e),
            },
            Message::Binary(_) => Some(ProtocolError::Malformed(
                "binary frames are not supported".into(),
            )),
            // Pongs to client pings are sent by the transport.
            Message::Ping(_) | Message::Pong(_) => None,
            Message::Close(_) => return DisconnectReason::PeerClosed,
        };

        if let Some(e) = violation {
            violations += 1;
            warn!(
                room_id = %ctx.room_id,
                user_id = %ctx.identity.user_id,
                violations,
                error = %e,
                "Protocol violation"
            );
            if violations >= ctx.config.max_violations {
                return DisconnectReason::ViolationLimit;
            }
        }
    }
}

/// Drain the outbound queue to the socket until the registry closes it,
/// then send a close frame. Queued frames are not flushed after a close.
pub async fn write_pump<Si>(
    mut sink: Si,
    mut queue: ConnectionQueue,
    config: ConnectionConfig,
) -> DisconnectReason
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        tokio::select! {
            biased;
            _ = queue.closed.notified() => break DisconnectReason::QueueClosed,
            frame = queue.frames.recv() => match frame {
                Some(frame) => {
                    let message = Message::Text(Utf8Bytes::from(frame.text.to_string()));
                    if let Err(e) = send(&mut sink, message, config.write_timeout).await {
                        return DisconnectReason::Transport(e);
                    }
                }
                None => break DisconnectReason::QueueClosed,
            },
            _ = ping.tick() => {
                if let Err(e) = send(&mut sink, Message::Ping(Default::default()), config.write_timeout).await {
                    return DisconnectReason::Transport(e);
                }
            }
        }
    };

    let close = Message::Close(Some(CloseFrame {
        code: close_code::NORMAL,
        reason: Utf8Bytes::from_static("connection closed"),
    }));
    if let Err(e) = send(&mut sink, close, config.write_timeout).await {
        debug!(error = %e, "Failed to send close frame");
    }
    reason
}

async fn send<Si>(sink: &mut Si, message: Message, deadline: Duration) -> Result<(), TransportError>
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Write(e.to_string())),
        Err(_) => Err(TransportError::WriteTimeout),
    }
}
