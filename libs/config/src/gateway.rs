//! Gateway configuration file
//!
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0:7878"
//! idle_timeout_ms = 30000
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [[users]]
//! user_id = "trader"
//! password = "${TRADER_PASSWORD}"
//! ```

use crate::error::{ConfigError, Result};
use config_crate::{Config, Environment, File, FileFormat};
use network::{ClientConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

pub const MIN_FRAME_LIMIT: usize = 1024;
pub const MAX_FRAME_LIMIT: usize = 64 * 1024 * 1024;

const ENV_PREFIX: &str = "GATEWAY";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
    pub users: Vec<UserCredential>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Account allowed to log in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCredential {
    pub user_id: String,
    /// `${VAR}` references are expanded from the environment at load time
    pub password: String,
    /// Empty accepts any broker
    #[serde(default)]
    pub broker_id: String,
}

impl GatewayConfig {
    /// Load from `path` (defaults only when `None`), apply `GATEWAY__*`
    /// overrides, expand environment references and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading gateway config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::finish(builder)
    }

    /// Same as [`load`](Self::load) over an in-memory TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::finish(Config::builder().add_source(File::from_str(content, FileFormat::Toml)))
    }

    fn finish(builder: config_crate::ConfigBuilder<config_crate::builder::DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        let mut gateway: GatewayConfig = config.try_deserialize()?;
        gateway.expand_env_vars()?;
        gateway.validate()?;
        debug!(users = gateway.users.len(), "Gateway config loaded");
        Ok(gateway)
    }

    /// Expand `${VAR}` references in addresses and passwords
    pub fn expand_env_vars(&mut self) -> Result<()> {
        self.server.bind_addr = expand("server.bind_addr", &self.server.bind_addr)?;
        self.client.server_addr = expand("client.server_addr", &self.client.server_addr)?;
        for user in &mut self.users {
            user.password = expand(&format!("users.{}.password", user.user_id), &user.password)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.idle_timeout_ms == 0 {
            return Err(ConfigError::invalid("server.idle_timeout_ms", "must be non-zero"));
        }
        if self.client.idle_timeout_ms == 0 {
            return Err(ConfigError::invalid("client.idle_timeout_ms", "must be non-zero"));
        }
        if self.client.connect_timeout_ms == 0 {
            return Err(ConfigError::invalid("client.connect_timeout_ms", "must be non-zero"));
        }
        check_frame_limit("server.max_frame_len", self.server.max_frame_len)?;
        check_frame_limit("client.max_frame_len", self.client.max_frame_len)?;

        let mut seen = HashSet::new();
        for user in &self.users {
            if user.user_id.is_empty() {
                return Err(ConfigError::invalid("users.user_id", "must not be empty"));
            }
            if !seen.insert(user.user_id.as_str()) {
                return Err(ConfigError::invalid(
                    "users.user_id",
                    format!("duplicate user '{}'", user.user_id),
                ));
            }
        }
        Ok(())
    }

    pub fn find_user(&self, user_id: &str) -> Option<&UserCredential> {
        self.users.iter().find(|u| u.user_id == user_id)
    }

    /// Render as TOML, e.g. to print the effective configuration
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn check_frame_limit(field: &str, value: usize) -> Result<()> {
    if !(MIN_FRAME_LIMIT..=MAX_FRAME_LIMIT).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{} outside {}..={}", value, MIN_FRAME_LIMIT, MAX_FRAME_LIMIT),
        ));
    }
    Ok(())
}

fn expand(field: &str, value: &str) -> Result<String> {
    shellexpand::env(value)
        .map(|v| v.into_owned())
        .map_err(|e| ConfigError::expand(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        fs::write(
            &path,
            r#"
[server]
bind_addr = "0.0.0.0:9000"
idle_timeout_ms = 5000

[logging]
level = "debug"
json = true

[[users]]
user_id = "trader"
password = "secret"
broker_id = "9999"
"#,
        )
        .unwrap();

        let config = GatewayConfig::load(Some(&path)).unwrap();

        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.server.idle_timeout_ms, 5000);
        assert!(config.server.heartbeat_on_idle);
        assert_eq!(config.client, ClientConfig::default());
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.find_user("trader").unwrap().broker_id, "9999");
        assert!(config.find_user("nobody").is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = GatewayConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_defaults_without_file() {
        let config = GatewayConfig::from_toml_str("").unwrap();
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.users.is_empty());
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let err = GatewayConfig::from_toml_str("[server]\nidle_timeout_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.idle_timeout_ms"));
    }

    #[test]
    fn test_frame_limit_bounds() {
        let err = GatewayConfig::from_toml_str("[server]\nmax_frame_len = 512\n").unwrap_err();
        assert!(err.to_string().contains("server.max_frame_len"));

        let err = GatewayConfig::from_toml_str("[client]\nmax_frame_len = 134217728\n").unwrap_err();
        assert!(err.to_string().contains("client.max_frame_len"));

        assert!(GatewayConfig::from_toml_str("[server]\nmax_frame_len = 1024\n").is_ok());
    }

    #[test]
    fn test_duplicate_users_rejected() {
        let content = r#"
[[users]]
user_id = "a"
password = "1"

[[users]]
user_id = "a"
password = "2"
"#;
        let err = GatewayConfig::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("duplicate user 'a'"));
    }

    #[test]
    fn test_password_expanded_from_environment() {
        std::env::set_var("GATEWAY_TEST_PASSWORD_7F3A", "from-env");
        let content = r#"
[[users]]
user_id = "ops"
password = "${GATEWAY_TEST_PASSWORD_7F3A}"
"#;
        let config = GatewayConfig::from_toml_str(content).unwrap();
        assert_eq!(config.find_user("ops").unwrap().password, "from-env");
    }

    #[test]
    fn test_unset_variable_is_an_error() {
        let content = r#"
[[users]]
user_id = "ops"
password = "${GATEWAY_TEST_UNSET_91C2}"
"#;
        let err = GatewayConfig::from_toml_str(content).unwrap_err();
        assert!(matches!(err, ConfigError::Expand { .. }));
    }

    #[test]
    fn test_rendered_config_loads_back() {
        let mut config = GatewayConfig::default();
        config.users.push(UserCredential {
            user_id: "trader".to_string(),
            password: "secret".to_string(),
            broker_id: String::new(),
        });
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(GatewayConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
