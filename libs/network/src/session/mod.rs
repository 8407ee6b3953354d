//! # Session
//!
//! One logical connection between a client and the gateway. The session owns
//! the typed framework state (login flag, outstanding heartbeat, lag, the
//! active request's response tracker) plus an open attribute map for
//! collaborator data.
//!
//! Outbound frames go through an unbounded channel into the connection's
//! single writer task, so writes from adaptors, heartbeat timers and pushes
//! never interleave within a frame.
//!
//! Closing is decided by one atomic transition: the first close trigger
//! cancels the I/O tasks, delivers the terminal event and releases the
//! attributes; every later trigger is a no-op.

pub mod attributes;
pub mod response;

pub use attributes::Attributes;
pub use response::{Responder, ResponseState, ResponseTracker};

use crate::error::{NetworkError, Result};
use crate::event::{panic_message, SessionAdaptor, SessionEvent};
use codec::{encode_frame, Frame, FrameKind};
use parking_lot::Mutex;
use std::any::Any;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};
use types::{Message, MessageKind, MessageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    Server,
    Client,
}

#[derive(Debug)]
struct OutstandingHeartbeat {
    id: String,
    sent_at: Instant,
}

pub struct Session {
    id: u64,
    role: SessionRole,
    remote_addr: SocketAddr,
    outbound: mpsc::UnboundedSender<Frame>,
    attributes: Attributes,
    logged_in: AtomicBool,
    heartbeat: Mutex<Option<OutstandingHeartbeat>>,
    lag: Mutex<Option<Duration>>,
    current: Mutex<Arc<ResponseTracker>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
    events: Arc<dyn SessionAdaptor>,
}

impl Session {
    /// New session and the receiving end of its outbound frame queue
    pub(crate) fn new(
        id: u64,
        role: SessionRole,
        remote_addr: SocketAddr,
        events: Arc<dyn SessionAdaptor>,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Frame>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            role,
            remote_addr,
            outbound,
            attributes: Attributes::new(),
            logged_in: AtomicBool::new(false),
            heartbeat: Mutex::new(None),
            lag: Mutex::new(None),
            current: Mutex::new(Arc::new(ResponseTracker::new())),
            closed: AtomicBool::new(false),
            shutdown,
            events,
        });
        (session, rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    pub(crate) fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::Release);
    }

    /// Drop back to the not-logged-in state, e.g. after a logout
    pub fn mark_logged_out(&self) {
        self.set_logged_in(false);
    }

    /// Round-trip time of the last matched heartbeat
    pub fn lag(&self) -> Option<Duration> {
        *self.lag.lock()
    }

    /// State of the request currently being served
    pub fn response_state(&self) -> ResponseState {
        self.current.lock().state()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.attributes.get(key)
    }

    pub fn set_attribute<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> bool {
        self.attributes.insert(key, value)
    }

    pub fn remove_attribute(&self, key: &str) -> bool {
        self.attributes.remove(key)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Encode `message` and queue it as a frame of `kind`
    pub fn send_frame(&self, kind: FrameKind, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(NetworkError::session_closed(self.id));
        }
        let frame = encode_frame(kind, message)?;
        self.outbound
            .send(frame)
            .map_err(|_| NetworkError::session_closed(self.id))
    }

    pub fn send_request(&self, message: &Message) -> Result<()> {
        self.send_frame(FrameKind::Request, message)
    }

    pub fn send_login(&self, message: &Message) -> Result<()> {
        self.send_frame(FrameKind::Login, message)
    }

    /// Send a heartbeat probe and record `id` as outstanding
    pub fn send_heartbeat(&self, id: &str) -> Result<()> {
        // recorded first: the reply may be handled on another task
        *self.heartbeat.lock() = Some(OutstandingHeartbeat {
            id: id.to_string(),
            sent_at: Instant::now(),
        });
        self.send_frame(FrameKind::Heartbeat, &Message::heartbeat(id))
    }

    /// Send an unsolicited return (`RTN_*` or `RSP_ERROR`) outside any request
    pub fn push(&self, message: &Message) -> Result<()> {
        let message_type = message.message_type();
        if message_type.kind() != MessageKind::Return && message_type != MessageType::RspError {
            return Err(NetworkError::protocol(format!(
                "{} cannot be pushed outside a request",
                message_type
            )));
        }
        self.send_frame(FrameKind::Response, message)
    }

    /// Send a response part for the request currently being served
    pub fn send_response(&self, message: &Message) -> Result<()> {
        let tracker = self.current.lock().clone();
        self.send_tracked(&tracker, message)
    }

    /// Complete the response of the request currently being served
    pub fn done(&self) -> Result<()> {
        let tracker = self.current.lock().clone();
        Ok(tracker.done()?)
    }

    pub(crate) fn send_tracked(&self, tracker: &ResponseTracker, message: &Message) -> Result<()> {
        tracker.send_part(message.current_count, message.total_count, || {
            self.send_frame(FrameKind::Response, message)
        })
    }

    /// Install a fresh tracker for a new inbound request
    pub(crate) fn begin_request(&self) -> Arc<ResponseTracker> {
        let tracker = Arc::new(ResponseTracker::new());
        *self.current.lock() = tracker.clone();
        tracker
    }

    pub(crate) fn outstanding_heartbeat(&self) -> Option<String> {
        self.heartbeat.lock().as_ref().map(|hb| hb.id.clone())
    }

    /// Clear the outstanding heartbeat if `id` matches it, recording the lag
    pub(crate) fn settle_heartbeat(&self, id: &str) -> Option<Duration> {
        let mut heartbeat = self.heartbeat.lock();
        match heartbeat.as_ref() {
            Some(outstanding) if outstanding.id == id => {
                let lag = outstanding.sent_at.elapsed();
                *heartbeat = None;
                *self.lag.lock() = Some(lag);
                Some(lag)
            }
            _ => None,
        }
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Deliver an event to the session's sink
    ///
    /// Nothing follows the terminal event: non-terminal events raised after
    /// close are dropped. A panicking sink is logged and otherwise ignored.
    pub fn emit(&self, event: SessionEvent) {
        if self.is_closed() && !event.is_terminal() {
            trace!(session = self.id, event = event.name(), "Event after close dropped");
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.events.on_event(self, &event)));
        if let Err(payload) = outcome {
            error!(
                session = self.id,
                event = event.name(),
                "Session event sink panicked: {}",
                panic_message(&*payload)
            );
        }
    }

    /// Close the session locally
    pub fn close(&self) {
        self.close_with(SessionEvent::Closed);
    }

    /// Close with the given terminal event; false if already closed
    pub(crate) fn close_with(&self, terminal: SessionEvent) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.shutdown.cancel();
        self.set_logged_in(false);
        self.emit(terminal);

        let released = self.attributes.release_all();
        debug!(session = self.id, released, "Session resources released");
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("remote_addr", &self.remote_addr)
            .field("logged_in", &self.is_logged_in())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_session, RecordingEvents};
    use codec::decode_message;
    use std::sync::atomic::AtomicUsize;
    use types::{Body, Candle, Order};

    struct Release(Arc<AtomicUsize>);

    impl Drop for Release {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        let released = Arc::new(AtomicUsize::new(0));
        session.set_attribute("md", Release(released.clone()));

        session.close();
        session.close();
        assert!(!session.close_with(SessionEvent::InputClosed));

        assert_eq!(events.names(), vec!["CLOSED"]);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(session.is_closed());
        assert!(session.shutdown_token().is_cancelled());
    }

    #[test]
    fn test_no_events_after_terminal() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        session.emit(SessionEvent::Idle);
        session.close();

        session.emit(SessionEvent::Idle);
        session.emit(SessionEvent::MissHeartbeat {
            heartbeat_id: "hb-9".to_string(),
        });
        session.emit(SessionEvent::Error(anyhow::anyhow!("late failure")));

        assert_eq!(events.names(), vec!["IDLE", "CLOSED"]);
        assert_eq!(events.count("CLOSED"), 1);
    }

    #[test]
    fn test_concurrent_close_delivers_one_terminal_event() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        let released = Arc::new(AtomicUsize::new(0));
        session.set_attribute("md", Release(released.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = session.clone();
                std::thread::spawn(move || {
                    if i % 2 == 0 {
                        session.close();
                    } else {
                        session.close_with(SessionEvent::InputClosed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(events.names().len(), 1);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_send_after_close_fails() {
        let (session, _rx) = test_session(RecordingEvents::new());
        session.close();
        let err = session
            .push(&Message::push(Body::RtnOrder(Order::default())))
            .unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn test_push_only_accepts_returns() {
        let (session, mut rx) = test_session(RecordingEvents::new());
        session
            .push(&Message::push(Body::RtnCandle(Candle::default())))
            .unwrap();
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, FrameKind::Response);
        assert_eq!(
            decode_message(&frame.body).unwrap().message_type(),
            MessageType::RtnCandle
        );

        let err = session
            .push(&Message::push(Body::RspReqQryOrder(None)))
            .unwrap_err();
        assert!(matches!(err, NetworkError::Protocol { .. }));
    }

    #[test]
    fn test_heartbeat_settles_only_matching_id() {
        let (session, mut rx) = test_session(RecordingEvents::new());
        session.send_heartbeat("hb-1").unwrap();
        assert_eq!(rx.try_recv().unwrap().kind, FrameKind::Heartbeat);
        assert_eq!(session.outstanding_heartbeat().as_deref(), Some("hb-1"));

        assert!(session.settle_heartbeat("hb-2").is_none());
        assert_eq!(session.outstanding_heartbeat().as_deref(), Some("hb-1"));
        assert!(session.lag().is_none());

        assert!(session.settle_heartbeat("hb-1").is_some());
        assert!(session.outstanding_heartbeat().is_none());
        assert!(session.lag().is_some());
    }

    #[test]
    fn test_begin_request_resets_state() {
        let (session, _rx) = test_session(RecordingEvents::new());
        let first = session.begin_request();
        first.send_part(1, 1, || Ok(())).unwrap();
        first.done().unwrap();
        assert_eq!(session.response_state(), ResponseState::Done);

        let _second = session.begin_request();
        assert_eq!(session.response_state(), ResponseState::NotYet);
        // the finished request's tracker is unaffected
        assert_eq!(first.state(), ResponseState::Done);
    }

    #[test]
    fn test_panicking_sink_does_not_propagate() {
        struct Explosive;
        impl SessionAdaptor for Explosive {
            fn on_event(&self, _session: &Session, _event: &SessionEvent) {
                panic!("sink failure");
            }
        }

        let (session, _rx) = Session::new(
            1,
            SessionRole::Server,
            "127.0.0.1:1".parse().unwrap(),
            Arc::new(Explosive),
            CancellationToken::new(),
        );
        session.emit(SessionEvent::Idle);
        session.close();
        assert!(session.is_closed());
    }
}
