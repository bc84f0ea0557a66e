//! Data Transfer Objects
//!
//! DTOs for HTTP and RPC request/response serialization.

pub mod request;
pub mod response;

pub use request::{RoomRequest, RpcSendMessageRequest, SendMessageRequest, StreamMessagesQuery};
pub use response::{OnlineUserResponse, RoomResponse, RoomUsersResponse, SendMessageResponse};
