//! # Message Envelope
//!
//! The logical unit carried in a frame body: a typed [`Body`] plus the
//! correlation and pagination fields shared by every message type.
//!
//! ## Correlation
//!
//! `request_id` is the correlation key: every part of a response carries the
//! `request_id` of the request it answers. `response_id` is fresh for every
//! outbound message and is informational only.
//!
//! ## Pagination
//!
//! `0 <= current_count <= total_count`. A single-shot response is `1/1`; a
//! multi-part response is a run of messages `1/n, 2/n, .. n/n` sharing
//! `request_id` and type. An empty result is a single `0/0` message.

use super::message_type::{Body, MessageType};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fresh correlation identifier (UUID v4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds since the UNIX epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Protocol-level result codes carried in `RspInfo.ErrorID`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ErrorCode {
    None = 0,
    InvalidLogin = 1,
    DuplicateLogin = 2,
    NotLoggedIn = 3,
    InvalidRequest = 4,
    InternalError = 5,
    OrderNotFound = 6,
    InstrumentNotFound = 7,
    OrderRejected = 8,
}

impl ErrorCode {
    pub fn is_ok(&self) -> bool {
        *self == ErrorCode::None
    }

    /// Default human readable text for the code
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::None => "success",
            ErrorCode::InvalidLogin => "invalid user or password",
            ErrorCode::DuplicateLogin => "session is already logged in",
            ErrorCode::NotLoggedIn => "session is not logged in",
            ErrorCode::InvalidRequest => "invalid request",
            ErrorCode::InternalError => "internal error",
            ErrorCode::OrderNotFound => "order not found",
            ErrorCode::InstrumentNotFound => "instrument not found",
            ErrorCode::OrderRejected => "order rejected",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, i32::from(*self))
    }
}

/// Result block attached to responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspInfo {
    #[serde(rename = "ErrorID")]
    pub error_id: i32,
    #[serde(rename = "ErrorMsg", default)]
    pub error_msg: String,
}

impl RspInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_id: code.into(),
            error_msg: message.into(),
        }
    }

    /// Result block using the code's default description
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.description())
    }

    pub fn success() -> Self {
        Self::from_code(ErrorCode::None)
    }

    /// Known error code, `None` for values outside the protocol table
    pub fn code(&self) -> Option<ErrorCode> {
        ErrorCode::try_from(self.error_id).ok()
    }

    pub fn is_success(&self) -> bool {
        self.error_id == i32::from(ErrorCode::None)
    }
}

/// Decoded gateway message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Body,
    pub request_id: String,
    pub response_id: String,
    pub current_count: i32,
    pub total_count: i32,
    pub rsp_info: Option<RspInfo>,
    pub timestamp: i64,
}

impl Message {
    /// New request with a fresh `request_id`
    pub fn request(body: Body) -> Self {
        Self {
            body,
            request_id: new_id(),
            response_id: String::new(),
            current_count: 1,
            total_count: 1,
            rsp_info: None,
            timestamp: now_millis(),
        }
    }

    /// One part of a response to `request_id`, with a fresh `response_id`
    pub fn response(
        request_id: impl Into<String>,
        body: Body,
        current_count: i32,
        total_count: i32,
    ) -> Self {
        Self {
            body,
            request_id: request_id.into(),
            response_id: new_id(),
            current_count,
            total_count,
            rsp_info: None,
            timestamp: now_millis(),
        }
    }

    /// Unsolicited server message (`RTN_*`)
    pub fn push(body: Body) -> Self {
        Self::response(String::new(), body, 1, 1)
    }

    /// Heartbeat probe carrying `id`
    pub fn heartbeat(id: impl Into<String>) -> Self {
        let mut message = Self::request(Body::ReqHeartbeat(()));
        message.request_id = id.into();
        message
    }

    /// Answer to a heartbeat probe, echoing its id
    pub fn heartbeat_reply(id: impl Into<String>) -> Self {
        Self::response(id, Body::RspReqHeartbeat(()), 1, 1)
    }

    pub fn with_rsp_info(mut self, rsp_info: RspInfo) -> Self {
        self.rsp_info = Some(rsp_info);
        self
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    /// Error code of the attached result block; no block means success
    pub fn error_id(&self) -> i32 {
        self.rsp_info
            .as_ref()
            .map(|info| info.error_id)
            .unwrap_or_else(|| ErrorCode::None.into())
    }

    pub fn is_success(&self) -> bool {
        self.error_id() == i32::from(ErrorCode::None)
    }

    /// Whether this message completes its logical response
    pub fn is_last(&self) -> bool {
        self.current_count >= self.total_count
    }

    /// `0 <= current_count <= total_count`
    pub fn has_valid_counts(&self) -> bool {
        self.current_count >= 0 && self.current_count <= self.total_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::InputOrder;

    #[test]
    fn test_request_ids_are_fresh() {
        let a = Message::request(Body::ReqQryAccount(Default::default()));
        let b = Message::request(Body::ReqQryAccount(Default::default()));
        assert_ne!(a.request_id, b.request_id);
        assert_eq!((a.current_count, a.total_count), (1, 1));
        assert!(a.is_success());
    }

    #[test]
    fn test_response_parts_share_request_id_not_response_id() {
        let first = Message::response("req-1", Body::RspReqQryPosition(None), 1, 2);
        let second = Message::response("req-1", Body::RspReqQryPosition(None), 2, 2);
        assert_eq!(first.request_id, second.request_id);
        assert_ne!(first.response_id, second.response_id);
        assert!(!first.is_last());
        assert!(second.is_last());
    }

    #[test]
    fn test_rsp_info_codes() {
        let info = RspInfo::from_code(ErrorCode::DuplicateLogin);
        assert_eq!(info.error_id, 2);
        assert_eq!(info.code(), Some(ErrorCode::DuplicateLogin));
        assert!(!info.is_success());

        let foreign = RspInfo {
            error_id: 9001,
            error_msg: "vendor specific".to_string(),
        };
        assert_eq!(foreign.code(), None);

        let message = Message::response("r", Body::RspReqOrderInsert(Some(InputOrder::default())), 1, 1)
            .with_rsp_info(RspInfo::from_code(ErrorCode::OrderRejected));
        assert_eq!(message.error_id(), 8);
        assert!(!message.is_success());
    }

    #[test]
    fn test_count_invariant() {
        let mut message = Message::response("r", Body::RspReqQryTrade(None), 0, 0);
        assert!(message.has_valid_counts());
        message.current_count = 3;
        message.total_count = 2;
        assert!(!message.has_valid_counts());
        message.current_count = -1;
        assert!(!message.has_valid_counts());
    }

    #[test]
    fn test_heartbeat_messages_echo_id() {
        let probe = Message::heartbeat("hb-7");
        assert_eq!(probe.message_type(), MessageType::ReqHeartbeat);
        assert_eq!(probe.request_id, "hb-7");

        let reply = Message::heartbeat_reply(probe.request_id.clone());
        assert_eq!(reply.message_type(), MessageType::RspReqHeartbeat);
        assert_eq!(reply.request_id, "hb-7");
    }
}
