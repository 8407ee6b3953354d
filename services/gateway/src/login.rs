//! Credential checks for LOGIN frames

use chrono::{DateTime, Local};
use gateway_config::{GatewayConfig, UserCredential};
use network::{LoginManager, Session};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use types::{Body, ErrorCode, LoginRequest, Message};

/// Session attribute holding the [`UserIdentity`]
pub const IDENTITY_KEY: &str = "gateway.identity";

/// Authenticated user of a session
#[derive(Debug, Clone, PartialEq)]
pub struct UserIdentity {
    pub user_id: String,
    pub broker_id: String,
    pub login_time: DateTime<Local>,
}

impl UserIdentity {
    pub fn of(session: &Session) -> Option<Arc<UserIdentity>> {
        session.attribute::<UserIdentity>(IDENTITY_KEY)
    }
}

pub struct CredentialLoginManager {
    users: HashMap<String, UserCredential>,
}

impl CredentialLoginManager {
    pub fn new(users: impl IntoIterator<Item = UserCredential>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|user| (user.user_id.clone(), user))
                .collect(),
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.users.iter().cloned())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Outcome of checking `request` against the configured users
    fn authenticate(&self, request: &LoginRequest) -> ErrorCode {
        let Some(user) = self.users.get(&request.user_id) else {
            warn!(user = %request.user_id, "Login for unknown user");
            return ErrorCode::InvalidLogin;
        };
        if user.password != request.password {
            warn!(user = %request.user_id, "Wrong password");
            return ErrorCode::InvalidLogin;
        }
        if !user.broker_id.is_empty() && user.broker_id != request.broker_id {
            warn!(user = %request.user_id, broker = %request.broker_id, "Broker mismatch");
            return ErrorCode::InvalidLogin;
        }
        ErrorCode::None
    }
}

impl LoginManager for CredentialLoginManager {
    fn do_login(&self, session: &Arc<Session>, message: &Message) -> ErrorCode {
        let Body::ReqLogin(request) = &message.body else {
            warn!(session = session.id(), message_type = %message.message_type(), "LOGIN frame without REQ_LOGIN");
            return ErrorCode::InvalidRequest;
        };

        let code = self.authenticate(request);
        if code != ErrorCode::None {
            return code;
        }

        session.set_attribute(
            IDENTITY_KEY,
            UserIdentity {
                user_id: request.user_id.clone(),
                broker_id: request.broker_id.clone(),
                login_time: Local::now(),
            },
        );
        info!(
            session = session.id(),
            user = %request.user_id,
            client_version = %request.client_version,
            "User authenticated"
        );
        ErrorCode::None
    }
}
