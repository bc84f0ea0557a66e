//! Application Layer
//!
//! Contains the registry, bridge and relay services and the data transfer
//! objects of the HTTP and RPC surfaces. This layer orchestrates the flow
//! of envelopes between the presentation layer and the collaborators.

pub mod dto;
pub mod services;
