//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Chat stores (PostgreSQL, in-memory)
//! - Message buses (Redis pub/sub, in-memory)
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod pubsub;
pub mod repositories;
