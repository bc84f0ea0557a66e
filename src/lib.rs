//! # Chat Relay Library
//!
//! The live message distribution core of a multi-room chat service:
//! - WebSocket connections with read/write pumps and bounded outbound queues
//! - A connection registry actor owning the room index
//! - A fan-out bridge to a publish/subscribe bus with dedup-based loop prevention
//! - HTTP and RPC ingress sharing one relay path
//!
//! ## Architecture
//!
//! - **Domain Layer**: envelopes, connection handles, collaborator traits
//! - **Application Layer**: registry, bridge and relay services; DTOs
//! - **Infrastructure Layer**: PostgreSQL store, Redis bus, in-memory variants, metrics
//! - **Presentation Layer**: HTTP routes, RPC gateway and WebSocket handlers
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Envelope, connection and collaborator contracts
//! +-- application/    Hub, bridge, relay and DTOs
//! +-- infrastructure/ Store and bus implementations, metrics
//! +-- presentation/   HTTP, RPC and WebSocket handlers
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core values and contracts
pub mod domain;

// Application layer - Relay services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP, RPC and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
