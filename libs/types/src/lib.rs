//! # Gateway Message Model
//!
//! Typed definitions for everything that travels inside a gateway frame body.
//!
//! ## Layout
//!
//! - [`protocol`]: the closed [`MessageType`] catalogue, the [`Body`] sum type
//!   carrying one payload per type, and the [`Message`] correlation envelope
//!   (`RequestID`, `CurrentCount`/`TotalCount`, `RspInfo`).
//! - [`common`]: pure data-transfer payloads (orders, trades, accounts,
//!   positions, market data) exchanged with the trading engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{Body, InputOrder, Message, MessageType};
//!
//! let order = InputOrder {
//!     instrument_id: "rb2410".to_string(),
//!     price: 3650.0,
//!     volume: 2,
//!     ..Default::default()
//! };
//! let request = Message::request(Body::ReqOrderInsert(order));
//! assert_eq!(request.message_type(), MessageType::ReqOrderInsert);
//! assert_eq!(request.message_type().response_type(), Some(MessageType::RspReqOrderInsert));
//! ```
//!
//! Wire encoding (JSON envelope and binary frames) lives in the `codec` crate;
//! this crate only knows shapes and the type-to-payload mapping.

pub mod common;
pub mod protocol;

pub use common::*;
pub use protocol::*;
