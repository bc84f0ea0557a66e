//! Application Services
//!
//! The live message distribution subsystem.
//!
//! ## Available Services
//!
//! - **Hub**: connection registry actor (register, unregister, broadcast)
//! - **RegistryState**: connection map and room index owned by the hub
//! - **FanoutBridge**: bus publish/subscribe with loop prevention
//! - **DedupWindow**: bounded seen-set of message ids used by the bridge
//! - **ChatRelay**: shared ingress path for socket, HTTP and RPC events

pub mod bridge;
pub mod dedup;
pub mod hub;
pub mod relay;
pub mod room_index;

// Re-export registry types
pub use hub::{Hub, HubConfig, HubError, Registration, DEFAULT_COMMAND_BUFFER};
pub use room_index::{FanOut, RegistrySnapshot, RegistryState};

// Re-export bridge types
pub use bridge::{BridgeConfig, FanoutBridge, Subscription};
pub use dedup::DedupWindow;

// Re-export relay types
pub use relay::{ChatRelay, Delivery, Dispatched, RelayError};
