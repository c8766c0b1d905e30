use crate::client::fetch::{FetchError, Fetcher};
use crate::client::record::{Category, Record};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a source is considered safe to browse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Safety {
    Safe,
    Unsafe { reason: String },
}

impl Safety {
    pub fn unsafe_because(reason: impl Into<String>) -> Self {
        Self::Unsafe {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }
}

/// Where an adapter comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Compiled-in scraper or API client
    Builtin,
    /// User-configured Torznab indexer
    ProtocolClient,
}

/// Static description of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique identifier
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Site (or API) root
    pub base_url: String,
    /// The single category this source focuses on, or `All`
    pub category: Category,
    pub safety: Safety,
    pub default_enabled: bool,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    /// Descriptor for a safe, default-enabled builtin source
    pub fn builtin(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            category,
            safety: Safety::Safe,
            default_enabled: true,
            kind: SourceKind::Builtin,
        }
    }

    /// Descriptor for a user-configured indexer
    pub fn protocol_client(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            kind: SourceKind::ProtocolClient,
            ..Self::builtin(id, name, base_url, category)
        }
    }

    #[must_use]
    pub fn with_safety(mut self, safety: Safety) -> Self {
        self.safety = safety;
        self
    }

    #[must_use]
    pub const fn disabled_by_default(mut self) -> Self {
        self.default_enabled = false;
        self
    }

    /// Whether this source serves the requested category
    #[must_use]
    pub fn serves(&self, requested: Category) -> bool {
        self.category == Category::All || self.category == requested
    }
}

/// Errors that can occur during provider operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Unexpected HTTP status {0}")]
    Http(u16),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Provider panicked: {0}")]
    Panicked(String),

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Map a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth(format!("HTTP {status}")),
            429 => Self::RateLimit,
            503 => Self::ServiceUnavailable("HTTP 503".to_string()),
            _ => Self::Http(status),
        }
    }
}

impl From<FetchError> for ProviderError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Timeout => Self::Timeout,
            FetchError::Connect(msg) => Self::Network(format!("Connection failed: {msg}")),
            FetchError::Request(msg) => Self::Network(format!("Request failed: {msg}")),
        }
    }
}

/// Trait implemented by every torrent source
///
/// Implementations must never fail on upstream markup: rows that cannot be
/// read are dropped and a missing result container yields an empty list.
/// Only transport failures and HTTP error statuses become `Err`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    fn descriptor(&self) -> &SourceDescriptor;

    /// Unique name/identifier for this provider
    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// Human readable name
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Search this source for `query` within `category`
    async fn search(
        &self,
        query: &str,
        category: Category,
        fetcher: &dyn Fetcher,
    ) -> Result<Vec<Record>, ProviderError>;
}
