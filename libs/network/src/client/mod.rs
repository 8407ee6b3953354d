//! # Gateway Client
//!
//! Connects to a gateway server, sends LOGIN and REQUEST frames and delivers
//! responses, returns and events through a single ordered dispatcher.

pub mod adaptor;
pub(crate) mod dispatcher;

pub use adaptor::{dispatch_response, CallbackResult, ClientMessageAdaptor};

use crate::config::ClientConfig;
use crate::error::{NetworkError, Result};
use crate::event::{LoggingSessionAdaptor, SessionAdaptor, SessionEvent};
use crate::session::{Session, SessionRole};
use crate::transport;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{Body, LoginRequest, Message};

/// Collaborators invoked on the client's behalf
#[derive(Clone)]
pub struct ClientHandlers {
    pub adaptor: Arc<dyn ClientMessageAdaptor>,
    pub events: Arc<dyn SessionAdaptor>,
}

impl ClientHandlers {
    pub fn new(adaptor: Arc<dyn ClientMessageAdaptor>) -> Self {
        Self {
            adaptor,
            events: Arc::new(LoggingSessionAdaptor),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn SessionAdaptor>) -> Self {
        self.events = events;
        self
    }
}

struct IgnoreAll;

impl ClientMessageAdaptor for IgnoreAll {}

impl Default for ClientHandlers {
    fn default() -> Self {
        Self::new(Arc::new(IgnoreAll))
    }
}

pub struct Client {
    session: Arc<Session>,
}

impl Client {
    /// Connect within the configured timeout and start the I/O tasks
    pub async fn connect(config: ClientConfig, handlers: ClientHandlers) -> Result<Client> {
        let settings = config.io_settings()?;
        let stream = tokio::time::timeout(
            config.connect_timeout(),
            TcpStream::connect(&config.server_addr),
        )
        .await
        .map_err(|_| NetworkError::timeout(format!("connect {}", config.server_addr), config.connect_timeout_ms))?
        .map_err(|e| {
            NetworkError::connection_with_source(
                format!("Failed to connect to {}", config.server_addr),
                None,
                e,
            )
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY: {}", e);
        }
        let remote_addr = stream
            .peer_addr()
            .map_err(|e| NetworkError::io("Failed to read peer address", e))?;
        // local port identifies the connection in logs
        let id = stream.local_addr().map(|a| u64::from(a.port())).unwrap_or_default();

        let (read_half, write_half) = stream.into_split();
        let (session, outbound) = Session::new(
            id,
            SessionRole::Client,
            remote_addr,
            handlers.events.clone(),
            CancellationToken::new(),
        );

        session.emit(SessionEvent::Created);
        let writer =
            transport::spawn_writer(session.clone(), write_half, outbound, settings.max_frame_len);
        session.emit(SessionEvent::Opened);
        info!(session = id, peer = %remote_addr, "Connected to gateway");

        let io_session = session.clone();
        tokio::spawn(async move {
            let (mut queue, consumer) = dispatcher::spawn(io_session.clone(), handlers.adaptor);
            let outcome = transport::read_loop(&io_session, read_half, settings, &mut queue).await;
            debug!(session = io_session.id(), outcome = ?outcome, "Read loop finished");

            // let queued callbacks run before the terminal event
            drop(queue);
            let _ = consumer.await;
            outcome.close(&io_session);
            let _ = writer.await;
        });

        Ok(Client { session })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// Send a LOGIN frame; returns the request id
    pub fn login(&self, request: LoginRequest) -> Result<String> {
        let message = Message::request(Body::ReqLogin(request));
        self.session.send_login(&message)?;
        Ok(message.request_id)
    }

    /// Send a REQUEST frame carrying `body`; returns the request id
    pub fn request(&self, body: Body) -> Result<String> {
        let message_type = body.message_type();
        if !message_type.is_request() {
            return Err(NetworkError::protocol(format!(
                "{} is not a request type",
                message_type
            )));
        }
        let message = Message::request(body);
        self.session.send_request(&message)?;
        Ok(message.request_id)
    }

    pub fn close(&self) {
        self.session.close();
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    /// Resolves once the connection has terminated
    pub async fn closed(&self) {
        self.session.shutdown_token().cancelled().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.session.close();
    }
}
