//! # Gateway Configuration
//!
//! Loads the gateway's settings from a TOML file with `GATEWAY__` environment
//! overrides, then validates them before anything binds a socket.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gateway_config::GatewayConfig;
//! use std::path::Path;
//!
//! let config = GatewayConfig::load(Some(Path::new("config/gateway.toml")))?;
//! println!("binding {}", config.server.bind_addr);
//! # Ok::<(), gateway_config::ConfigError>(())
//! ```
//!
//! `GATEWAY__SERVER__IDLE_TIMEOUT_MS=5000` overrides `server.idle_timeout_ms`.

pub mod error;
pub mod gateway;

pub use error::{ConfigError, Result};
pub use gateway::{GatewayConfig, LoggingConfig, UserCredential, MAX_FRAME_LIMIT, MIN_FRAME_LIMIT};
