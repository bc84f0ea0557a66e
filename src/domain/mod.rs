//! # Domain Layer
//!
//! The values every component of the relay exchanges, and the contracts of
//! the external collaborators (storage, bus) the relay consumes.
//!
//! ## Design Principles
//!
//! - No dependencies on the presentation layer
//! - Envelopes are immutable once built at ingress
//! - Collaborator traits define the only way out of the process

pub mod entities;

pub use entities::*;
