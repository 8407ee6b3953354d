//! # Session Events
//!
//! Lifecycle and per-message failure notifications delivered to a
//! [`SessionAdaptor`]:
//!
//! ```text
//! CREATED → OPENED → {IDLE, ERROR, MISS_HEARTBEAT, MESSAGE_NOT_DONE,
//!                     STRANGE_MESSAGE, BROKEN_BODY}* → CLOSED | INPUT_CLOSED
//! ```
//!
//! Exactly one terminal event is delivered per session.

use crate::session::Session;
use bytes::Bytes;
use codec::{FrameKind, MessageCodecError};
use std::any::Any;
use tracing::{debug, error, info, warn};
use types::MessageType;

#[derive(Debug)]
pub enum SessionEvent {
    /// Transport observed the connection
    Created,
    /// I/O tasks are running
    Opened,
    /// No inbound frame within the idle timeout
    Idle,
    /// Handler failure or transport error
    Error(anyhow::Error),
    /// Heartbeat timed out (outstanding id) or a reply did not match (received id)
    MissHeartbeat { heartbeat_id: String },
    /// Every adaptor ran and none completed the response
    MessageNotDone {
        message_type: MessageType,
        request_id: String,
    },
    /// Frame kind or message type not acceptable here
    StrangeMessage {
        frame_kind: FrameKind,
        type_name: Option<String>,
    },
    /// Frame body could not be decoded; raw bytes attached
    BrokenBody {
        frame_kind: FrameKind,
        body: Bytes,
        reason: String,
    },
    /// Session closed locally or by a transport failure
    Closed,
    /// Peer closed its side of the stream
    InputClosed,
}

impl SessionEvent {
    /// Map a body decode failure to the event reporting it
    pub fn from_decode_error(frame_kind: FrameKind, body: Bytes, err: MessageCodecError) -> Self {
        match err {
            MessageCodecError::BrokenBody { reason } => SessionEvent::BrokenBody {
                frame_kind,
                body,
                reason,
            },
            MessageCodecError::StrangeMessage { type_name } => SessionEvent::StrangeMessage {
                frame_kind,
                type_name: Some(type_name),
            },
            other @ MessageCodecError::Encode { .. } => SessionEvent::Error(other.into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Created => "CREATED",
            SessionEvent::Opened => "OPENED",
            SessionEvent::Idle => "IDLE",
            SessionEvent::Error(_) => "ERROR",
            SessionEvent::MissHeartbeat { .. } => "MISS_HEARTBEAT",
            SessionEvent::MessageNotDone { .. } => "MESSAGE_NOT_DONE",
            SessionEvent::StrangeMessage { .. } => "STRANGE_MESSAGE",
            SessionEvent::BrokenBody { .. } => "BROKEN_BODY",
            SessionEvent::Closed => "CLOSED",
            SessionEvent::InputClosed => "INPUT_CLOSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Closed | SessionEvent::InputClosed)
    }
}

/// Receiver of session events
///
/// Called synchronously from the session's I/O tasks; implementations must
/// not block.
pub trait SessionAdaptor: Send + Sync {
    fn on_event(&self, session: &Session, event: &SessionEvent);
}

/// Default sink: logs every event at a level matching its severity
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSessionAdaptor;

impl SessionAdaptor for LoggingSessionAdaptor {
    fn on_event(&self, session: &Session, event: &SessionEvent) {
        let id = session.id();
        let peer = session.remote_addr();

        match event {
            SessionEvent::Created | SessionEvent::Opened | SessionEvent::Idle => {
                debug!(session = id, peer = %peer, event = event.name(), "Session event");
            }
            SessionEvent::Closed | SessionEvent::InputClosed => {
                info!(session = id, peer = %peer, event = event.name(), "Session terminated");
            }
            SessionEvent::Error(err) => {
                error!(session = id, peer = %peer, "Session error: {:#}", err);
            }
            SessionEvent::MissHeartbeat { heartbeat_id } => {
                warn!(session = id, peer = %peer, heartbeat = %heartbeat_id, "Missed heartbeat");
            }
            SessionEvent::MessageNotDone {
                message_type,
                request_id,
            } => {
                warn!(
                    session = id,
                    peer = %peer,
                    message_type = %message_type,
                    request = %request_id,
                    "No adaptor completed the request"
                );
            }
            SessionEvent::StrangeMessage {
                frame_kind,
                type_name,
            } => {
                warn!(
                    session = id,
                    peer = %peer,
                    frame = %frame_kind,
                    message_type = type_name.as_deref().unwrap_or("-"),
                    "Strange message"
                );
            }
            SessionEvent::BrokenBody {
                frame_kind,
                body,
                reason,
            } => {
                warn!(
                    session = id,
                    peer = %peer,
                    frame = %frame_kind,
                    len = body.len(),
                    "Broken message body: {}",
                    reason
                );
            }
        }
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
