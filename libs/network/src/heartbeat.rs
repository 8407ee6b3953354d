//! # Heartbeat Monitor
//!
//! Liveness probing on idle connections. Missed or mismatched heartbeats are
//! reported as `MISS_HEARTBEAT` events; they never close the session.

use crate::event::SessionEvent;
use crate::session::Session;
use codec::FrameKind;
use tracing::debug;
use types::{new_id, Message, MessageType};

/// Idle timeout fired: report it and, when probing, send a fresh heartbeat
pub(crate) fn on_idle(session: &Session, probe: bool) {
    session.emit(SessionEvent::Idle);
    if !probe {
        return;
    }

    if let Some(outstanding) = session.outstanding_heartbeat() {
        session.emit(SessionEvent::MissHeartbeat {
            heartbeat_id: outstanding,
        });
    }

    let id = new_id();
    if let Err(e) = session.send_heartbeat(&id) {
        debug!(session = session.id(), "Failed to send heartbeat: {}", e);
    }
}

/// Inbound HEARTBEAT frame
pub(crate) fn on_heartbeat(session: &Session, message: &Message) {
    if message.message_type() == MessageType::ReqHeartbeat {
        let reply = Message::heartbeat_reply(message.request_id.clone());
        if let Err(e) = session.send_frame(FrameKind::Heartbeat, &reply) {
            debug!(session = session.id(), "Failed to answer heartbeat: {}", e);
        }
        return;
    }

    match session.settle_heartbeat(&message.request_id) {
        Some(lag) => {
            debug!(session = session.id(), lag_us = lag.as_micros() as u64, "Heartbeat acknowledged");
        }
        None => session.emit(SessionEvent::MissHeartbeat {
            heartbeat_id: message.request_id.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_session, RecordingEvents};
    use codec::decode_message;

    #[test]
    fn test_idle_sends_probe_and_records_it() {
        let events = RecordingEvents::new();
        let (session, mut rx) = test_session(events.clone());

        on_idle(&session, true);

        assert_eq!(events.names(), vec!["IDLE"]);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.kind, FrameKind::Heartbeat);
        let probe = decode_message(&frame.body).unwrap();
        assert_eq!(probe.message_type(), MessageType::ReqHeartbeat);
        assert_eq!(session.outstanding_heartbeat(), Some(probe.request_id));
    }

    #[test]
    fn test_idle_with_outstanding_probe_reports_timeout() {
        let events = RecordingEvents::new();
        let (session, mut rx) = test_session(events.clone());

        on_idle(&session, true);
        let first = session.outstanding_heartbeat().unwrap();
        on_idle(&session, true);

        assert_eq!(
            events.entries(),
            vec![
                "IDLE".to_string(),
                "IDLE".to_string(),
                format!("MISS_HEARTBEAT:{}", first)
            ]
        );
        let second = session.outstanding_heartbeat().unwrap();
        assert_ne!(first, second);
        assert_eq!(rx.try_recv().unwrap().kind, FrameKind::Heartbeat);
        assert_eq!(rx.try_recv().unwrap().kind, FrameKind::Heartbeat);
    }

    #[test]
    fn test_idle_without_probing_only_reports() {
        let events = RecordingEvents::new();
        let (session, mut rx) = test_session(events.clone());
        on_idle(&session, false);
        assert_eq!(events.names(), vec!["IDLE"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_probe_is_echoed() {
        let (session, mut rx) = test_session(RecordingEvents::new());
        on_heartbeat(&session, &Message::heartbeat("peer-7"));

        let reply = decode_message(&rx.try_recv().unwrap().body).unwrap();
        assert_eq!(reply.message_type(), MessageType::RspReqHeartbeat);
        assert_eq!(reply.request_id, "peer-7");
    }

    #[test]
    fn test_matching_reply_clears_outstanding() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        session.send_heartbeat("A").unwrap();

        on_heartbeat(&session, &Message::heartbeat_reply("A"));

        assert!(session.outstanding_heartbeat().is_none());
        assert!(session.lag().is_some());
        assert!(events.entries().is_empty());
    }

    #[test]
    fn test_mismatched_reply_reports_received_id() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        session.send_heartbeat("A").unwrap();

        on_heartbeat(&session, &Message::heartbeat_reply("B"));

        assert_eq!(events.entries(), vec!["MISS_HEARTBEAT:B".to_string()]);
        assert_eq!(session.outstanding_heartbeat().as_deref(), Some("A"));
    }

    #[test]
    fn test_unsolicited_reply_reports_received_id() {
        let events = RecordingEvents::new();
        let (session, _rx) = test_session(events.clone());
        on_heartbeat(&session, &Message::heartbeat_reply("C"));
        assert_eq!(events.entries(), vec!["MISS_HEARTBEAT:C".to_string()]);
    }
}
