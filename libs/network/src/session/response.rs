//! # Response State Machine
//!
//! Each inbound request gets a fresh [`ResponseTracker`]:
//!
//! ```text
//! NOT_YET ──send──► SENDING ──send──► SENDING ──done──► DONE
//!    │                 │
//!    └──────fail───────┴──────────────────────────────► ERROR
//! ```
//!
//! Transitions only move forward. Parts of a run must arrive as
//! `1/n, 2/n, .. n/n` with a constant `n`; an empty result is a single `0/0`.
//! A refused part is never written.

use super::Session;
use crate::error::{ResponseError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use types::{Body, ErrorCode, Message, MessageType, RspInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseState {
    NotYet,
    Sending,
    Done,
    Error,
}

impl ResponseState {
    /// DONE or ERROR
    pub fn is_complete(&self) -> bool {
        matches!(self, ResponseState::Done | ResponseState::Error)
    }
}

#[derive(Debug)]
struct Progress {
    state: ResponseState,
    last_count: i32,
    run_total: Option<i32>,
}

/// Guards the response of one request
#[derive(Debug)]
pub struct ResponseTracker {
    progress: Mutex<Progress>,
}

impl Default for ResponseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseTracker {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(Progress {
                state: ResponseState::NotYet,
                last_count: 0,
                run_total: None,
            }),
        }
    }

    pub fn state(&self) -> ResponseState {
        self.progress.lock().state
    }

    /// Validate part `current/total`, run `write` and record the part.
    ///
    /// The lock is held across `write`, so concurrent senders cannot
    /// interleave parts on the wire.
    pub fn send_part<F>(&self, current: i32, total: i32, write: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let mut progress = self.progress.lock();

        if progress.state.is_complete() {
            return Err(ResponseError::AlreadyCompleted {
                state: progress.state,
            }
            .into());
        }
        if current < 0 || current > total {
            return Err(ResponseError::CountOverflow { current, total }.into());
        }
        if let Some(run_total) = progress.run_total {
            if run_total != total {
                return Err(ResponseError::TotalMismatch {
                    expected: run_total,
                    got: total,
                }
                .into());
            }
        }

        let expected = if total == 0 { 0 } else { progress.last_count + 1 };
        let repeated_empty = total == 0 && progress.run_total.is_some();
        if current != expected || repeated_empty {
            return Err(ResponseError::OutOfOrder {
                expected,
                got: current,
            }
            .into());
        }

        write()?;

        progress.state = ResponseState::Sending;
        progress.last_count = current;
        progress.run_total = Some(total);
        Ok(())
    }

    /// Move to DONE
    pub fn done(&self) -> std::result::Result<(), ResponseError> {
        let mut progress = self.progress.lock();
        if progress.state.is_complete() {
            return Err(ResponseError::AlreadyCompleted {
                state: progress.state,
            });
        }
        progress.state = ResponseState::Done;
        Ok(())
    }

    /// Move to ERROR; returns false if the response had already completed
    pub fn fail(&self) -> bool {
        let mut progress = self.progress.lock();
        if progress.state.is_complete() {
            return false;
        }
        progress.state = ResponseState::Error;
        true
    }
}

/// Handle for answering one request
///
/// Cheap to clone; a clone may be moved to another task or thread to finish
/// the response after the adaptor has returned.
#[derive(Clone)]
pub struct Responder {
    session: Arc<Session>,
    tracker: Arc<ResponseTracker>,
    request_id: String,
    response_type: MessageType,
}

impl Responder {
    pub(crate) fn new(
        session: Arc<Session>,
        tracker: Arc<ResponseTracker>,
        request_id: String,
        response_type: MessageType,
    ) -> Self {
        Self {
            session,
            tracker,
            request_id,
            response_type,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Type every part of the answer must carry (or `RSP_ERROR`)
    pub fn response_type(&self) -> MessageType {
        self.response_type
    }

    pub fn state(&self) -> ResponseState {
        self.tracker.state()
    }

    /// Send a fully built response part
    pub fn send_response(&self, message: Message) -> Result<()> {
        let got = message.message_type();
        if got != self.response_type && got != MessageType::RspError {
            return Err(ResponseError::UnexpectedType {
                expected: self.response_type,
                got,
            }
            .into());
        }
        self.session.send_tracked(&self.tracker, &message)
    }

    /// Send part `current/total` carrying `body`
    pub fn send_part(&self, body: Body, current: i32, total: i32) -> Result<()> {
        let message = Message::response(self.request_id.clone(), body, current, total)
            .with_rsp_info(RspInfo::success());
        self.send_response(message)
    }

    /// Complete the response
    pub fn done(&self) -> Result<()> {
        Ok(self.tracker.done()?)
    }

    /// Single-part answer, then DONE
    pub fn reply(&self, body: Body) -> Result<()> {
        self.send_part(body, 1, 1)?;
        self.done()
    }

    /// Error answer with an empty body, then DONE
    pub fn reply_error(&self, code: ErrorCode, message: impl Into<String>) -> Result<()> {
        let response = Message::response(
            self.request_id.clone(),
            Body::empty(self.response_type),
            1,
            1,
        )
        .with_rsp_info(RspInfo::new(code, message));
        self.send_response(response)?;
        self.done()
    }

    /// Multi-part answer, then DONE; an empty iterator sends one `0/0` part
    pub fn reply_all<I>(&self, bodies: I) -> Result<()>
    where
        I: IntoIterator<Item = Body>,
    {
        let bodies: Vec<Body> = bodies.into_iter().collect();
        if bodies.is_empty() {
            self.send_part(Body::empty(self.response_type), 0, 0)?;
            return self.done();
        }

        let total = i32::try_from(bodies.len())
            .map_err(|_| ResponseError::CountOverflow {
                current: 0,
                total: i32::MAX,
            })?;
        for (index, body) in bodies.into_iter().enumerate() {
            self.send_part(body, index as i32 + 1, total)?;
        }
        self.done()
    }

    /// Mark the response failed without sending anything
    pub fn fail(&self) -> bool {
        self.tracker.fail()
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("session", &self.session.id())
            .field("request_id", &self.request_id)
            .field("response_type", &self.response_type)
            .field("state", &self.state())
            .finish()
    }
}
