//! # Gateway Session Framework
//!
//! Login-gated request/response sessions over TCP.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → libs/codec → [network] → services/gateway
//!   Message     Frame/JSON    Sessions     Login, trading,
//!   Body                      Adaptors     market data
//! ```
//!
//! ## Module Map
//! - [`session`]: per-connection state, attributes and the response state machine
//! - [`login`]: login gating and the [`LoginManager`] seam
//! - [`heartbeat`]: idle probing and heartbeat matching
//! - [`server`]: accept loop, frame routing and the adaptor chain
//! - [`client`]: connection, ordered response dispatcher and typed callbacks
//! - [`event`]: session event taxonomy and the default logging sink
//!
//! Per-message failures never cross the protocol boundary as errors; they
//! are reported to the session's [`SessionAdaptor`] as events.

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod login;
pub mod server;
pub mod session;
mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{dispatch_response, CallbackResult, Client, ClientHandlers, ClientMessageAdaptor};
pub use config::{ClientConfig, ServerConfig};
pub use error::{NetworkError, ResponseError, Result};
pub use event::{LoggingSessionAdaptor, SessionAdaptor, SessionEvent};
pub use login::{AcceptAllLoginManager, LoginManager};
pub use server::{
    dispatch_request, AdaptorChain, Flow, HandlerResult, RequestContext, Server, ServerContext,
    ServerMessageAdaptor,
};
pub use session::{Attributes, Responder, ResponseState, ResponseTracker, Session, SessionRole};
