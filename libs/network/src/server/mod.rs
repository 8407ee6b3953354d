//! # Gateway Server
//!
//! Accept loop plus per-connection frame routing:
//!
//! | Frame kind | Handling |
//! |---|---|
//! | LOGIN | [`LoginManager`], answered with a LOGIN frame |
//! | REQUEST | [`AdaptorChain`] once logged in; silently dropped before |
//! | HEARTBEAT | heartbeat monitor, in any login state |
//! | RESPONSE / unknown | `STRANGE_MESSAGE` |
//!
//! Decoding and adaptor dispatch run on the connection's read task.

pub mod adaptor;
pub mod chain;

pub use adaptor::{dispatch_request, Flow, HandlerResult, RequestContext, ServerMessageAdaptor};
pub use chain::AdaptorChain;

use crate::config::{IoSettings, ServerConfig};
use crate::error::{NetworkError, Result};
use crate::event::{LoggingSessionAdaptor, SessionAdaptor, SessionEvent};
use crate::heartbeat;
use crate::login::{self, LoginManager};
use crate::session::{Session, SessionRole};
use crate::transport::{self, FrameHandler};
use codec::{decode_message, peek_type, Frame, FrameKind};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration and collaborators shared by every server session
pub struct ServerContext {
    pub config: ServerConfig,
    pub login_manager: Arc<dyn LoginManager>,
    pub chain: AdaptorChain,
    pub events: Arc<dyn SessionAdaptor>,
}

impl ServerContext {
    pub fn new(config: ServerConfig, login_manager: Arc<dyn LoginManager>) -> Self {
        Self {
            config,
            login_manager,
            chain: AdaptorChain::new(),
            events: Arc::new(LoggingSessionAdaptor),
        }
    }

    pub fn with_adaptor(mut self, adaptor: Arc<dyn ServerMessageAdaptor>) -> Self {
        self.chain.push(adaptor);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn SessionAdaptor>) -> Self {
        self.events = events;
        self
    }
}

pub struct Server {
    listener: TcpListener,
    context: Arc<ServerContext>,
    settings: IoSettings,
    shutdown: CancellationToken,
    sessions: Arc<DashMap<u64, Arc<Session>>>,
    next_session_id: AtomicU64,
}

impl Server {
    /// Bind the configured address
    pub async fn bind(context: ServerContext) -> Result<Server> {
        let settings = context.config.io_settings()?;
        let listener = TcpListener::bind(&context.config.bind_addr)
            .await
            .map_err(|e| {
                NetworkError::io(format!("Failed to bind {}", context.config.bind_addr), e)
            })?;

        info!(
            addr = %context.config.bind_addr,
            adaptors = context.chain.len(),
            "Gateway server bound"
        );

        Ok(Server {
            listener,
            context: Arc::new(context),
            settings,
            shutdown: CancellationToken::new(),
            sessions: Arc::new(DashMap::new()),
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| NetworkError::io("Failed to read local address", e))
    }

    /// Token that stops the accept loop and closes every session
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Sessions currently connected
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Accept connections until shutdown
    pub async fn run(self) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
                        tokio::spawn(serve_connection(
                            stream,
                            addr,
                            id,
                            self.context.clone(),
                            self.settings,
                            self.shutdown.child_token(),
                            self.sessions.clone(),
                        ));
                    }
                    Err(e) => {
                        // transient (e.g. fd exhaustion); keep accepting
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    }
                }
            }
        }

        let open: Vec<Arc<Session>> = self.sessions.iter().map(|e| e.value().clone()).collect();
        for session in open {
            session.close();
        }
        info!("Gateway server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: u64,
    context: Arc<ServerContext>,
    settings: IoSettings,
    token: CancellationToken,
    sessions: Arc<DashMap<u64, Arc<Session>>>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(session = id, "Failed to set TCP_NODELAY: {}", e);
    }
    let (read_half, write_half) = stream.into_split();
    let (session, outbound) = Session::new(
        id,
        SessionRole::Server,
        addr,
        context.events.clone(),
        token,
    );

    session.emit(SessionEvent::Created);
    sessions.insert(id, session.clone());
    let writer = transport::spawn_writer(session.clone(), write_half, outbound, settings.max_frame_len);
    session.emit(SessionEvent::Opened);

    let mut handler = ServerFrameHandler { context };
    let outcome = transport::read_loop(&session, read_half, settings, &mut handler).await;
    debug!(session = id, outcome = ?outcome, "Read loop finished");
    outcome.close(&session);

    let _ = writer.await;
    sessions.remove(&id);
}

struct ServerFrameHandler {
    context: Arc<ServerContext>,
}

impl FrameHandler for ServerFrameHandler {
    fn on_frame(&mut self, session: &Arc<Session>, frame: Frame) {
        match frame.kind {
            FrameKind::Login => match decode_message(&frame.body) {
                Ok(message) => {
                    login::handle_login(session, self.context.login_manager.as_ref(), message)
                }
                Err(e) => session.emit(SessionEvent::from_decode_error(frame.kind, frame.body, e)),
            },
            FrameKind::Request => {
                if !session.is_logged_in() {
                    debug!(session = session.id(), "Request before login dropped");
                    return;
                }
                match decode_message(&frame.body) {
                    Ok(message) => self.context.chain.invoke(session, message),
                    Err(e) => {
                        session.emit(SessionEvent::from_decode_error(frame.kind, frame.body, e))
                    }
                }
            }
            FrameKind::Heartbeat => match decode_message(&frame.body) {
                Ok(message) => heartbeat::on_heartbeat(session, &message),
                Err(e) => session.emit(SessionEvent::from_decode_error(frame.kind, frame.body, e)),
            },
            FrameKind::Response | FrameKind::Unknown(_) => {
                session.emit(SessionEvent::StrangeMessage {
                    frame_kind: frame.kind,
                    type_name: peek_type(&frame.body),
                });
            }
        }
    }
}
