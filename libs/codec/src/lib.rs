//! # Gateway Protocol Codec
//!
//! ## Purpose
//!
//! The "rules" layer between the pure data model in `types` and the
//! connection handling in `network`:
//! - length-prefixed framing of the byte stream ([`frame`])
//! - the JSON message envelope carried inside each frame ([`message`])
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/network
//!     ↑           ↓            ↓
//!  Message    Frame/JSON    Sessions
//!  Body       rules         Sockets
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Socket management or session state (belongs in network/)
//! - Message or payload definitions (belongs in libs/types)

pub mod error;
pub mod frame;
pub mod message;

pub use error::{FrameError, FrameResult, MessageCodecError, MessageResult};
pub use frame::{
    decode, encode, encode_into, Decoded, Frame, FrameCodec, FrameKind, DEFAULT_MAX_FRAME_LEN,
    HEADER_LEN,
};
pub use message::{decode_message, encode_frame, encode_message, peek_type};
