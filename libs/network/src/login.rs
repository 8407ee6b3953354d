//! # Login Gating
//!
//! A session starts not logged in. The first successful LOGIN exchange marks
//! it logged in; until then REQUEST frames are dropped without a response.
//! Every LOGIN frame is answered with a LOGIN frame of type `RSP_REQ_LOGIN`
//! carrying the outcome in `RspInfo.ErrorID`.

use crate::event::{panic_message, SessionEvent};
use crate::session::Session;
use codec::FrameKind;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::{Body, ErrorCode, LoginResponse, Message, RspInfo};

/// Authenticates LOGIN frames
///
/// Implementations record the authenticated identity in the session's
/// attributes before returning [`ErrorCode::None`].
pub trait LoginManager: Send + Sync {
    fn do_login(&self, session: &Arc<Session>, message: &Message) -> ErrorCode;
}

/// Accepts every login; for tests and local tooling
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllLoginManager;

impl LoginManager for AcceptAllLoginManager {
    fn do_login(&self, _session: &Arc<Session>, _message: &Message) -> ErrorCode {
        ErrorCode::None
    }
}

/// Handle an inbound LOGIN frame on the server
pub(crate) fn handle_login(session: &Arc<Session>, manager: &dyn LoginManager, message: Message) {
    let code = if session.is_logged_in() {
        ErrorCode::DuplicateLogin
    } else {
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| manager.do_login(session, &message)));
        match outcome {
            Ok(code) => code,
            Err(payload) => {
                session.emit(SessionEvent::Error(anyhow::anyhow!(
                    "login manager panicked: {}",
                    panic_message(&*payload)
                )));
                ErrorCode::InternalError
            }
        }
    };

    match code {
        ErrorCode::None => {
            session.set_logged_in(true);
            info!(session = session.id(), peer = %session.remote_addr(), "Session logged in");
        }
        ErrorCode::DuplicateLogin => {
            debug!(session = session.id(), "Duplicate login refused");
        }
        other => {
            warn!(session = session.id(), peer = %session.remote_addr(), code = %other, "Login refused");
        }
    }

    let reply = login_reply(session, &message, code);
    if let Err(e) = session.send_frame(FrameKind::Login, &reply) {
        debug!(session = session.id(), "Failed to answer login: {}", e);
    }
}

fn login_reply(session: &Session, request: &Message, code: ErrorCode) -> Message {
    let body = match (&request.body, code) {
        (Body::ReqLogin(login), ErrorCode::None) => {
            let now = chrono::Local::now();
            Some(LoginResponse {
                user_id: login.user_id.clone(),
                trading_day: now.format("%Y%m%d").to_string(),
                login_time: now.format("%H:%M:%S").to_string(),
                session_id: session.id(),
            })
        }
        _ => None,
    };

    Message::response(request.request_id.clone(), Body::RspReqLogin(body), 1, 1)
        .with_rsp_info(RspInfo::from_code(code))
}
