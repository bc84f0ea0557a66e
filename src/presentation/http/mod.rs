//! HTTP API
//!
//! Route tables and request handlers.

pub mod handlers;
pub mod routes;
