//! # Adaptor Chain
//!
//! Chain of responsibility over the registered [`ServerMessageAdaptor`]s.
//! Adaptors run in registration order until one completes the response
//! (DONE or ERROR) or returns [`Flow::Stop`]. A chain that runs out without
//! a completed response reports `MESSAGE_NOT_DONE` once.

use super::adaptor::{dispatch_request, Flow, RequestContext, ServerMessageAdaptor};
use crate::event::{panic_message, SessionEvent};
use crate::session::{Responder, Session};
use codec::FrameKind;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::trace;
use types::Message;

#[derive(Clone, Default)]
pub struct AdaptorChain {
    adaptors: Vec<Arc<dyn ServerMessageAdaptor>>,
}

impl AdaptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, adaptor: Arc<dyn ServerMessageAdaptor>) {
        self.adaptors.push(adaptor);
    }

    pub fn with(mut self, adaptor: Arc<dyn ServerMessageAdaptor>) -> Self {
        self.push(adaptor);
        self
    }

    pub fn len(&self) -> usize {
        self.adaptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adaptors.is_empty()
    }

    /// Serve one inbound request
    pub fn invoke(&self, session: &Arc<Session>, message: Message) {
        let message_type = message.message_type();
        let Some(response_type) = message_type.response_type() else {
            session.emit(SessionEvent::StrangeMessage {
                frame_kind: FrameKind::Request,
                type_name: Some(message_type.to_string()),
            });
            return;
        };

        let tracker = session.begin_request();
        let responder = Responder::new(
            session.clone(),
            tracker.clone(),
            message.request_id.clone(),
            response_type,
        );
        let ctx = RequestContext::new(session, &message, responder);

        for adaptor in &self.adaptors {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| dispatch_request(adaptor.as_ref(), &ctx)));

            let flow = match outcome {
                Ok(Ok(flow)) => flow,
                Ok(Err(err)) => {
                    tracker.fail();
                    session.emit(SessionEvent::Error(err.context(format!(
                        "{} failed on {} {}",
                        adaptor.name(),
                        message_type,
                        message.request_id
                    ))));
                    return;
                }
                Err(payload) => {
                    tracker.fail();
                    session.emit(SessionEvent::Error(anyhow::anyhow!(
                        "{} panicked on {} {}: {}",
                        adaptor.name(),
                        message_type,
                        message.request_id,
                        panic_message(&*payload)
                    )));
                    return;
                }
            };

            trace!(
                session = session.id(),
                adaptor = adaptor.name(),
                flow = ?flow,
                state = ?tracker.state(),
                "Adaptor finished"
            );

            if tracker.state().is_complete() || flow == Flow::Stop {
                return;
            }
        }

        session.emit(SessionEvent::MessageNotDone {
            message_type,
            request_id: message.request_id.clone(),
        });
    }
}
