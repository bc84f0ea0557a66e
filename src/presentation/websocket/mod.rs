//! WebSocket Gateway
//!
//! Real-time room connections: upgrade handling, per-connection state and
//! the read/write pumps.

pub mod handler;
pub mod pumps;
pub mod session;

pub use handler::{serve_connection, ws_handler, ConnectParams};
pub use pumps::{DisconnectReason, TransportError};
pub use session::ConnectionConfig;
