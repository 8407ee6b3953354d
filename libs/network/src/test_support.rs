//! Helpers shared by unit tests

use crate::event::{SessionAdaptor, SessionEvent};
use crate::session::{Session, SessionRole};
use codec::Frame;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Sink recording `NAME` or `NAME:detail` per event
#[derive(Default)]
pub(crate) struct RecordingEvents {
    seen: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn names(&self) -> Vec<String> {
        self.seen
            .lock()
            .iter()
            .map(|entry| entry.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn entries(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| n.as_str() == name).count()
    }
}

impl SessionAdaptor for RecordingEvents {
    fn on_event(&self, _session: &Session, event: &SessionEvent) {
        let entry = match event {
            SessionEvent::MissHeartbeat { heartbeat_id } => {
                format!("{}:{}", event.name(), heartbeat_id)
            }
            SessionEvent::MessageNotDone { request_id, .. } => {
                format!("{}:{}", event.name(), request_id)
            }
            SessionEvent::StrangeMessage { type_name, .. } => {
                format!("{}:{}", event.name(), type_name.as_deref().unwrap_or(""))
            }
            SessionEvent::Error(err) => format!("{}:{:#}", event.name(), err),
            other => other.name().to_string(),
        };
        self.seen.lock().push(entry);
    }
}

pub(crate) fn test_session(
    events: Arc<RecordingEvents>,
) -> (Arc<Session>, mpsc::UnboundedReceiver<Frame>) {
    Session::new(
        1,
        SessionRole::Server,
        "127.0.0.1:40000".parse().expect("valid address"),
        events,
        CancellationToken::new(),
    )
}
