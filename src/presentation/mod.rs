//! Presentation Layer
//!
//! HTTP routes, the RPC gateway and WebSocket handlers.

pub mod http;
pub mod middleware;
pub mod rpc;
pub mod websocket;
