//! Session event sink for the gateway

use crate::login::UserIdentity;
use dashmap::DashMap;
use network::{LoggingSessionAdaptor, Session, SessionAdaptor, SessionEvent};
use tracing::info;

/// Logs every event and keeps per-event totals across all sessions
#[derive(Default)]
pub struct GatewayEvents {
    logger: LoggingSessionAdaptor,
    counts: DashMap<&'static str, u64>,
}

impl GatewayEvents {
    pub fn count(&self, name: &str) -> u64 {
        self.counts.get(name).map_or(0, |c| *c)
    }

    /// `(event, total)` pairs sorted by event name
    pub fn totals(&self) -> Vec<(&'static str, u64)> {
        let mut totals: Vec<(&'static str, u64)> =
            self.counts.iter().map(|e| (*e.key(), *e.value())).collect();
        totals.sort_unstable();
        totals
    }
}

impl SessionAdaptor for GatewayEvents {
    fn on_event(&self, session: &Session, event: &SessionEvent) {
        self.logger.on_event(session, event);
        *self.counts.entry(event.name()).or_default() += 1;

        if event.is_terminal() {
            let user = UserIdentity::of(session).map(|identity| identity.user_id.clone());
            info!(
                session = session.id(),
                peer = %session.remote_addr(),
                user = user.as_deref().unwrap_or("-"),
                lag_us = session.lag().map(|lag| lag.as_micros() as u64),
                "Session ended"
            );
        }
    }
}
