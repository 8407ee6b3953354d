//! # Message Body Codec
//!
//! JSON envelope carried in a frame body:
//!
//! ```text
//! {"Type": "REQ_ORDER_INSERT", "RequestID": "...", "ResponseID": "...",
//!  "CurrentCount": 1, "TotalCount": 1, "Body": {...},
//!  "RspInfo": {"ErrorID": 0, "ErrorMsg": ""} | null, "TimeStamp": 1700000000000}
//! ```
//!
//! Decoding reports two distinct failure classes: a body that cannot be used
//! at all ([`MessageCodecError::BrokenBody`]) and a well-formed envelope whose
//! `Type` is not in the catalogue ([`MessageCodecError::StrangeMessage`]).

use crate::error::{MessageCodecError, MessageResult};
use crate::frame::{Frame, FrameKind};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::{Body, Message, MessageType, RspInfo};

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutboundEnvelope<'a> {
    #[serde(rename = "Type")]
    message_type: &'static str,
    #[serde(rename = "RequestID")]
    request_id: &'a str,
    #[serde(rename = "ResponseID")]
    response_id: &'a str,
    current_count: i32,
    total_count: i32,
    body: Value,
    rsp_info: Option<&'a RspInfo>,
    #[serde(rename = "TimeStamp")]
    timestamp: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InboundEnvelope {
    #[serde(rename = "Type")]
    message_type: String,
    #[serde(rename = "RequestID", default)]
    request_id: String,
    #[serde(rename = "ResponseID", default)]
    response_id: String,
    #[serde(default)]
    current_count: i32,
    #[serde(default)]
    total_count: i32,
    #[serde(default)]
    body: Value,
    #[serde(default)]
    rsp_info: Option<RspInfo>,
    #[serde(rename = "TimeStamp", default)]
    timestamp: i64,
}

/// Serialise a message into a frame body
pub fn encode_message(message: &Message) -> MessageResult<Bytes> {
    let message_type = message.message_type();
    let body = message
        .body
        .to_value()
        .map_err(|e| MessageCodecError::encode(message_type, e))?;

    let envelope = OutboundEnvelope {
        message_type: message_type.as_str(),
        request_id: &message.request_id,
        response_id: &message.response_id,
        current_count: message.current_count,
        total_count: message.total_count,
        body,
        rsp_info: message.rsp_info.as_ref(),
        timestamp: message.timestamp,
    };

    serde_json::to_vec(&envelope)
        .map(Bytes::from)
        .map_err(|e| MessageCodecError::encode(message_type, e))
}

/// Serialise a message and wrap it in a frame of `kind`
pub fn encode_frame(kind: FrameKind, message: &Message) -> MessageResult<Frame> {
    Ok(Frame::new(kind, encode_message(message)?))
}

/// `Type` field of a body, without decoding the rest
pub fn peek_type(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct TypeOnly {
        #[serde(rename = "Type")]
        message_type: String,
    }

    serde_json::from_slice::<TypeOnly>(body)
        .ok()
        .map(|t| t.message_type)
}

/// Parse a frame body into a typed message
pub fn decode_message(body: &[u8]) -> MessageResult<Message> {
    let envelope: InboundEnvelope = serde_json::from_slice(body)
        .map_err(|e| MessageCodecError::broken_body(format!("invalid envelope: {}", e)))?;

    let message_type: MessageType = envelope
        .message_type
        .parse()
        .map_err(|_| MessageCodecError::strange_message(&envelope.message_type))?;

    let body = Body::decode(message_type, envelope.body).map_err(|e| {
        MessageCodecError::broken_body(format!("{} payload: {}", message_type, e))
    })?;

    let message = Message {
        body,
        request_id: envelope.request_id,
        response_id: envelope.response_id,
        current_count: envelope.current_count,
        total_count: envelope.total_count,
        rsp_info: envelope.rsp_info,
        timestamp: envelope.timestamp,
    };

    if !message.has_valid_counts() {
        return Err(MessageCodecError::broken_body(format!(
            "inconsistent counts {}/{}",
            message.current_count, message.total_count
        )));
    }

    Ok(message)
}
