use thiserror::Error;

/// Crate-level error type
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Client errors
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    // Source errors
    #[error("Provider error: {0}")]
    Provider(#[from] crate::client::providers::ProviderError),
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`]
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error comes from user-supplied input or configuration
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidInput { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
