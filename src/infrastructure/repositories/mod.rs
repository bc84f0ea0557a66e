//! Store Implementations
//!
//! Concrete implementations of the `ChatStore` collaborator trait.
//!
//! ## Available Stores
//!
//! - **PgChatStore** - PostgreSQL (`messages`, `room_members`, `users`)
//! - **MemoryChatStore** - in-process, for single-node runs and tests
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chat_relay::domain::ChatStore;
//! use chat_relay::infrastructure::repositories::PgChatStore;
//!
//! let store: Arc<dyn ChatStore> = Arc::new(PgChatStore::new(pool));
//! ```

mod chat_store;
mod memory_store;

pub use chat_store::PgChatStore;
pub use memory_store::MemoryChatStore;
