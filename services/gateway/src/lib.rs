//! # Futures Gateway Service
//!
//! Wires the session framework to concrete collaborators:
//! - [`CredentialLoginManager`]: checks logins against configured users
//! - [`MarketDataAdaptor`]: subscriptions and candle queries over a shared [`MarketDataRouter`]
//! - [`PaperTradingAdaptor`]: in-memory order execution, positions and account queries
//! - [`GatewayEvents`]: session event logging

pub mod engine;
pub mod events;
pub mod login;
pub mod market_data;

pub use engine::PaperTradingAdaptor;
pub use events::GatewayEvents;
pub use login::{CredentialLoginManager, UserIdentity, IDENTITY_KEY};
pub use market_data::{MarketDataAdaptor, MarketDataRouter, SUBSCRIPTION_KEY};

use gateway_config::GatewayConfig;
use network::ServerContext;
use std::sync::Arc;

/// Server context with the full adaptor chain: market data first, then trading
pub fn build_context(config: &GatewayConfig, router: Arc<MarketDataRouter>) -> ServerContext {
    let login = Arc::new(CredentialLoginManager::from_config(config));
    ServerContext::new(config.server.clone(), login)
        .with_adaptor(Arc::new(MarketDataAdaptor::new(router.clone())))
        .with_adaptor(Arc::new(PaperTradingAdaptor::new(router)))
        .with_events(Arc::new(GatewayEvents::default()))
}
