//! Protocol layer: message catalogue, payload table and correlation envelope.

#[macro_use]
mod macros;

pub mod message;
pub mod message_type;

pub use message::{new_id, now_millis, ErrorCode, Message, RspInfo};
pub use message_type::{Body, MessageKind, MessageType, UnknownMessageType};
