//! # Client Response Dispatcher
//!
//! The read task decodes each frame and enqueues it; exactly one consumer
//! task drains the queue, so every callback and every decode-failure event of
//! a connection happens in arrival order.

use super::adaptor::{dispatch_response, ClientMessageAdaptor};
use crate::event::{panic_message, SessionEvent};
use crate::heartbeat;
use crate::session::Session;
use crate::transport::FrameHandler;
use bytes::Bytes;
use codec::{decode_message, Frame, FrameKind, MessageCodecError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use types::{Message, MessageKind, MessageType};

/// One received frame, decoded on the read task
#[derive(Debug)]
pub(crate) struct Inbound {
    pub kind: FrameKind,
    pub decoded: Result<Message, MessageCodecError>,
    pub raw: Bytes,
}

/// Producer side, driven by the read loop
pub(crate) struct DispatchQueue {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl FrameHandler for DispatchQueue {
    fn on_frame(&mut self, session: &Arc<Session>, frame: Frame) {
        let item = Inbound {
            kind: frame.kind,
            decoded: decode_message(&frame.body),
            raw: frame.body,
        };
        if self.tx.send(item).is_err() {
            debug!(session = session.id(), "Dispatcher gone, frame dropped");
        }
    }
}

/// Start the consumer task; it ends once the queue is dropped and drained,
/// or at the first item seen after the session closed
pub(crate) fn spawn(
    session: Arc<Session>,
    adaptor: Arc<dyn ClientMessageAdaptor>,
) -> (DispatchQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Inbound>();
    let consumer = tokio::spawn(async move {
        let mut dispatched = 0u64;
        while let Some(item) = rx.recv().await {
            if session.is_closed() {
                debug!(session = session.id(), "Session closed, queued frames discarded");
                break;
            }
            process(&session, adaptor.as_ref(), item);
            dispatched += 1;
        }
        debug!(session = session.id(), dispatched, "Dispatcher stopped");
    });
    (DispatchQueue { tx }, consumer)
}

pub(crate) fn process(session: &Arc<Session>, adaptor: &dyn ClientMessageAdaptor, item: Inbound) {
    let message = match item.decoded {
        Ok(message) => message,
        Err(e) => {
            session.emit(SessionEvent::from_decode_error(item.kind, item.raw, e));
            return;
        }
    };

    guarded(session, "on_message", || adaptor.on_message(session, &message));
    if session.is_closed() {
        return;
    }

    match item.kind {
        FrameKind::Login => {
            session.set_logged_in(message.is_success());
            guarded(session, "login response", || {
                dispatch_response(adaptor, session, &message)
            });
        }
        FrameKind::Response => {
            if message.message_type().kind() == MessageKind::Request {
                session.emit(SessionEvent::StrangeMessage {
                    frame_kind: item.kind,
                    type_name: Some(message.message_type().to_string()),
                });
            } else if !session.is_logged_in() {
                trace!(
                    session = session.id(),
                    message_type = %message.message_type(),
                    "Response before login dropped"
                );
            } else {
                guarded(session, message.message_type().as_str(), || {
                    dispatch_response(adaptor, session, &message)
                });
            }
        }
        FrameKind::Heartbeat => {
            heartbeat::on_heartbeat(session, &message);
            if message.message_type() == MessageType::RspReqHeartbeat {
                guarded(session, "heartbeat response", || {
                    dispatch_response(adaptor, session, &message)
                });
            }
        }
        FrameKind::Request | FrameKind::Unknown(_) => {
            session.emit(SessionEvent::StrangeMessage {
                frame_kind: item.kind,
                type_name: Some(message.message_type().to_string()),
            });
        }
    }
}

/// Run a callback, turning errors and panics into ERROR events
fn guarded<F>(session: &Session, what: &str, callback: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            session.emit(SessionEvent::Error(err.context(format!("{} callback failed", what))));
        }
        Err(payload) => {
            session.emit(SessionEvent::Error(anyhow::anyhow!(
                "{} callback panicked: {}",
                what,
                panic_message(&*payload)
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::adaptor::CallbackResult;
    use crate::test_support::{test_session, RecordingEvents};
    use codec::encode_message;
    use parking_lot::Mutex;
    use types::{Body, ErrorCode, InputOrder, LoginResponse, Order, RspInfo};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl ClientMessageAdaptor for Recorder {
        fn on_message(&self, _session: &Arc<Session>, message: &Message) -> CallbackResult {
            self.calls.lock().push(format!("message:{}", message.message_type()));
            Ok(())
        }

        fn on_rsp_req_login(
            &self,
            session: &Arc<Session>,
            _message: &Message,
            _payload: &Option<LoginResponse>,
        ) -> CallbackResult {
            self.calls
                .lock()
                .push(format!("login:{}", session.is_logged_in()));
            Ok(())
        }

        fn on_rsp_req_order_insert(
            &self,
            _session: &Arc<Session>,
            message: &Message,
            _payload: &Option<InputOrder>,
        ) -> CallbackResult {
            self.calls.lock().push(format!("insert:{}", message.request_id));
            Ok(())
        }

        fn on_rtn_order(&self, _session: &Arc<Session>, _message: &Message, _payload: &Order) -> CallbackResult {
            anyhow::bail!("order book out of sync")
        }
    }

    fn inbound(kind: FrameKind, message: &Message) -> Inbound {
        let raw = encode_message(message).unwrap();
        Inbound {
            kind,
            decoded: decode_message(&raw),
            raw,
        }
    }

    fn login_reply(code: ErrorCode) -> Message {
        Message::response("login-1", Body::RspReqLogin(None), 1, 1)
            .with_rsp_info(RspInfo::from_code(code))
    }

    #[test]
    fn test_login_response_sets_flag_before_callback() {
        let (session, _rx) = test_session(RecordingEvents::new());
        let recorder = Recorder::default();

        process(&session, &recorder, inbound(FrameKind::Login, &login_reply(ErrorCode::None)));
        assert!(session.is_logged_in());
        assert_eq!(recorder.calls(), vec!["message:RSP_REQ_LOGIN", "login:true"]);

        process(
            &session,
            &recorder,
            inbound(FrameKind::Login, &login_reply(ErrorCode::InvalidLogin)),
        );
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_responses_before_login_are_dropped() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        let recorder = Recorder::default();
        let reply = Message::response("r1", Body::RspReqOrderInsert(None), 1, 1);

        process(&session, &recorder, inbound(FrameKind::Response, &reply));
        assert_eq!(recorder.calls(), vec!["message:RSP_REQ_ORDER_INSERT"]);
        assert!(events.entries().is_empty());

        session.set_logged_in(true);
        process(&session, &recorder, inbound(FrameKind::Response, &reply));
        assert_eq!(recorder.calls().last().unwrap(), "insert:r1");
    }

    #[test]
    fn test_callback_error_becomes_event() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        session.set_logged_in(true);

        process(
            &session,
            &Recorder::default(),
            inbound(FrameKind::Response, &Message::push(Body::RtnOrder(Order::default()))),
        );

        assert_eq!(events.names(), vec!["ERROR"]);
        assert!(events.entries()[0].contains("order book out of sync"));
    }

    #[test]
    fn test_decode_failures_are_reported_in_order() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        let recorder = Recorder::default();

        let broken = Bytes::from_static(b"{]");
        process(
            &session,
            &recorder,
            Inbound {
                kind: FrameKind::Response,
                decoded: decode_message(&broken),
                raw: broken.clone(),
            },
        );
        let strange = Bytes::from_static(br#"{"Type":"RTN_WEATHER"}"#);
        process(
            &session,
            &recorder,
            Inbound {
                kind: FrameKind::Response,
                decoded: decode_message(&strange),
                raw: strange.clone(),
            },
        );

        assert_eq!(
            events.entries(),
            vec!["BROKEN_BODY".to_string(), "STRANGE_MESSAGE:RTN_WEATHER".to_string()]
        );
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_request_on_client_is_strange() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        process(
            &session,
            &Recorder::default(),
            inbound(
                FrameKind::Request,
                &Message::request(Body::ReqOrderInsert(InputOrder::default())),
            ),
        );
        assert_eq!(events.names(), vec!["STRANGE_MESSAGE"]);
    }

    #[tokio::test]
    async fn test_consumer_preserves_arrival_order() {
        let (session, _rx) = test_session(RecordingEvents::new());
        session.set_logged_in(true);
        let recorder = Arc::new(Recorder::default());
        let (mut queue, consumer) = spawn(session.clone(), recorder.clone());

        for i in 0..50 {
            let reply = Message::response(format!("r{}", i), Body::RspReqOrderInsert(None), 1, 1);
            let frame = codec::encode_frame(FrameKind::Response, &reply).unwrap();
            queue.on_frame(&session, frame);
        }
        drop(queue);
        consumer.await.unwrap();

        let inserts: Vec<String> = recorder
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("insert:"))
            .collect();
        let expected: Vec<String> = (0..50).map(|i| format!("insert:r{}", i)).collect();
        assert_eq!(inserts, expected);
    }

    #[tokio::test]
    async fn test_consumer_stops_after_local_close() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        session.set_logged_in(true);
        let recorder = Arc::new(Recorder::default());
        let (mut queue, consumer) = spawn(session.clone(), recorder.clone());

        session.close();
        queue.on_frame(&session, Frame::new(FrameKind::Response, b"{]".to_vec()));
        let reply = Message::response("r1", Body::RspReqOrderInsert(None), 1, 1);
        queue.on_frame(&session, codec::encode_frame(FrameKind::Response, &reply).unwrap());
        drop(queue);
        consumer.await.unwrap();

        assert!(recorder.calls().is_empty());
        assert_eq!(events.names(), vec!["CLOSED"]);
    }
}
