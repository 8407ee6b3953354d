use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config_crate::ConfigError),

    #[error("Invalid configuration value for '{field}': {message}")]
    Invalid { field: String, message: String },

    #[error("Failed to expand '{field}': {message}")]
    Expand { field: String, message: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn expand(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Expand {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
