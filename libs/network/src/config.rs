//! Server and client connection settings

use crate::error::{NetworkError, Result};
use codec::DEFAULT_MAX_FRAME_LEN;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_ADDR: &str = "127.0.0.1:7878";
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// No inbound frame for this long raises IDLE
    pub idle_timeout_ms: u64,
    /// Probe the peer with a heartbeat whenever the connection goes idle
    pub heartbeat_on_idle: bool,
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            heartbeat_on_idle: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub(crate) fn io_settings(&self) -> Result<IoSettings> {
        IoSettings::new(self.idle_timeout_ms, self.heartbeat_on_idle, self.max_frame_len)
    }
}

/// Outbound connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: String,
    pub connect_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub heartbeat_on_idle: bool,
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_ADDR.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            heartbeat_on_idle: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub(crate) fn io_settings(&self) -> Result<IoSettings> {
        IoSettings::new(self.idle_timeout_ms, self.heartbeat_on_idle, self.max_frame_len)
    }
}

/// Per-connection I/O parameters shared by both roles
#[derive(Debug, Clone, Copy)]
pub(crate) struct IoSettings {
    pub idle_timeout: Duration,
    pub heartbeat_on_idle: bool,
    pub max_frame_len: usize,
}

impl IoSettings {
    fn new(idle_timeout_ms: u64, heartbeat_on_idle: bool, max_frame_len: usize) -> Result<Self> {
        if idle_timeout_ms == 0 {
            return Err(NetworkError::configuration(
                "idle timeout must be positive",
                Some("idle_timeout_ms"),
            ));
        }
        if max_frame_len == 0 {
            return Err(NetworkError::configuration(
                "frame limit must be positive",
                Some("max_frame_len"),
            ));
        }
        Ok(Self {
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            heartbeat_on_idle,
            max_frame_len,
        })
    }
}
